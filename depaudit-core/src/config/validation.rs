//! Configuration validation module

use crate::config::{
    LoggingConfig, QueueBackend, QueueConfig, SandboxConfig, ServerConfig, StorageConfig,
    WorkerConfig,
};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Server configuration error: {message}")]
    Server { message: String },

    #[error("Queue configuration error: {message}")]
    Queue { message: String },

    #[error("Storage configuration error: {message}")]
    Storage { message: String },

    #[error("Sandbox configuration error: {message}")]
    Sandbox { message: String },

    #[error("Worker configuration error: {message}")]
    Worker { message: String },

    #[error("Logging configuration error: {message}")]
    Logging { message: String },
}

impl ValidationError {
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn sandbox(message: impl Into<String>) -> Self {
        Self::Sandbox {
            message: message.into(),
        }
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // u16 cannot exceed 65535, so only 0 needs rejecting
        if self.port == 0 {
            return Err(ValidationError::server(format!(
                "Port must be in range 1-65535, got {}",
                self.port
            )));
        }

        if self.host.is_empty() {
            return Err(ValidationError::server("Host cannot be empty"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ValidationError::server(
                "Request timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == QueueBackend::Redis
            && !self.redis_url.starts_with("redis://")
            && !self.redis_url.starts_with("rediss://")
        {
            return Err(ValidationError::queue(format!(
                "redis_url must start with redis:// or rediss://, got: {}",
                self.redis_url
            )));
        }

        if self.key_prefix.is_empty() {
            return Err(ValidationError::queue("key_prefix cannot be empty"));
        }

        if self.lease_ttl_seconds == 0 {
            return Err(ValidationError::queue(
                "lease_ttl_seconds must be greater than 0",
            ));
        }

        if self.stalled_check_interval_seconds == 0 {
            return Err(ValidationError::queue(
                "stalled_check_interval_seconds must be greater than 0",
            ));
        }

        if self.claim_timeout_seconds == 0 {
            return Err(ValidationError::queue(
                "claim_timeout_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.reports_dir.as_os_str().is_empty() {
            return Err(ValidationError::storage("reports_dir cannot be empty"));
        }
        Ok(())
    }
}

impl Validate for SandboxConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ValidationError::sandbox("workspace_root cannot be empty"));
        }

        if self.install_command.program.trim().is_empty() {
            return Err(ValidationError::sandbox(
                "install_command.program cannot be empty",
            ));
        }

        if self.scan_command.program.trim().is_empty() {
            return Err(ValidationError::sandbox(
                "scan_command.program cannot be empty",
            ));
        }

        if self.step_timeout_seconds == 0 {
            return Err(ValidationError::sandbox(
                "step_timeout_seconds must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validate for WorkerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::worker("concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// In-flight jobs must be able to finish both steps before shutdown gives up.
pub(crate) fn validate_drain_timeout(
    worker: &WorkerConfig,
    sandbox: &SandboxConfig,
) -> Result<(), ValidationError> {
    let minimum = sandbox.step_timeout_seconds.saturating_mul(2);
    if worker.drain_timeout_seconds < minimum {
        return Err(ValidationError::worker(format!(
            "drain_timeout_seconds ({}) must be at least twice sandbox.step_timeout_seconds ({})",
            worker.drain_timeout_seconds, sandbox.step_timeout_seconds
        )));
    }
    Ok(())
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        match self.format.as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(ValidationError::logging(format!(
                "format must be one of json, pretty, compact; got: {}",
                other
            ))),
        }
    }
}
