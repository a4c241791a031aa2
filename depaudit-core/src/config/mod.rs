//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub sandbox: SandboxConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub allowed_origins: Vec<String>,
    /// Serve the OpenAPI document at `/api-docs/openapi.json`
    pub enable_docs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_seconds: 30,
            allowed_origins: vec!["*".to_string()],
            enable_docs: true,
        }
    }
}

/// Which transport backs the job queue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// In-process queue (development, tests, single instance)
    #[default]
    Memory,
    /// Redis/Dragonfly shared by the server and all workers
    Redis,
}

/// Job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub redis_url: String,
    /// Prefix of every key the queue writes
    pub key_prefix: String,
    /// How long a claimed job stays leased without a heartbeat
    pub lease_ttl_seconds: u64,
    /// How often each worker looks for expired leases
    pub stalled_check_interval_seconds: u64,
    /// How long a worker blocks waiting for a job before re-checking shutdown
    pub claim_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "depaudit:audit".to_string(),
            lease_ttl_seconds: 30,
            stalled_check_interval_seconds: 15,
            claim_timeout_seconds: 5,
        }
    }
}

impl QueueConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }

    pub fn stalled_check_interval(&self) -> Duration {
        Duration::from_secs(self.stalled_check_interval_seconds)
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_seconds)
    }
}

/// Report storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<job_id>.json` per completed job
    pub reports_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("storage/reports"),
        }
    }
}

/// An external command: program plus arguments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandConfig {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl std::fmt::Display for CommandConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Sandbox and audit tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Parent directory of every per-job workspace
    pub workspace_root: PathBuf,
    pub install_command: CommandConfig,
    pub scan_command: CommandConfig,
    /// Upper bound for each of the install and scan steps
    pub step_timeout_seconds: u64,
    /// Workspaces older than this are considered residue of a killed worker
    pub stale_workspace_max_age_seconds: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("depaudit"),
            install_command: CommandConfig::new("npm", &["install"]),
            scan_command: CommandConfig::new("npm", &["audit", "--json"]),
            step_timeout_seconds: 300,
            stale_workspace_max_age_seconds: 3600,
        }
    }
}

impl SandboxConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_seconds)
    }

    pub fn stale_workspace_max_age(&self) -> Duration {
        Duration::from_secs(self.stale_workspace_max_age_seconds)
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Run worker loops inside the server process
    pub embedded: bool,
    /// Number of independent worker loops per process
    pub concurrency: usize,
    /// How long shutdown waits for in-flight jobs; at least twice
    /// `sandbox.step_timeout_seconds` so install and scan can both finish
    pub drain_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            embedded: true,
            concurrency: 1,
            drain_timeout_seconds: 600,
        }
    }
}

impl WorkerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json`, `pretty`, or `compact`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.queue.validate()?;
        self.storage.validate()?;
        self.sandbox.validate()?;
        self.worker.validate()?;
        self.logging.validate()?;
        validation::validate_drain_timeout(&self.worker, &self.sandbox)?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        // Add environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("DEPAUDIT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins")
                    .with_list_parse_key("sandbox.install_command.args")
                    .with_list_parse_key("sandbox.scan_command.args")
                    .try_parsing(true),
            );

        let mut config: Config = builder.build()?.try_deserialize()?;

        // REDIS_URL is the conventional override shared with other services
        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            config.queue.redis_url = redis_url;
        }

        config.validate()?;

        Ok(config)
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
