//! Audit tool boundary and error types

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while preparing or tearing down a workspace
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Workspace root missing or not writable
    #[error("Failed to create workspace under {root}: {source}")]
    CreationFailed {
        root: String,
        #[source]
        source: std::io::Error,
    },

    /// Package descriptor could not be written
    #[error("Failed to materialize manifest: {0}")]
    Materialize(String),

    #[error("Failed to remove workspace {path}: {source}")]
    CleanupFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running an external command
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("I/O error while waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished child process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last `max_chars` characters of stderr, for error messages
    pub fn stderr_tail(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let trimmed = text.trim();
        let count = trimmed.chars().count();
        if count <= max_chars {
            trimmed.to_string()
        } else {
            trimmed.chars().skip(count - max_chars).collect()
        }
    }
}

/// Scan result tagged with the exit flag.
///
/// `ok` mirrors the exit status and is informational only: the scan tool exits
/// non-zero when it finds vulnerabilities, so `stdout` is parsed either way.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub ok: bool,
    pub stdout: String,
}

impl From<CommandOutput> for ScanOutput {
    fn from(output: CommandOutput) -> Self {
        Self {
            ok: output.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        }
    }
}

/// The external install+scan tool.
///
/// Both steps run with `workspace` as the working directory, which already
/// contains the materialized `package.json`.
#[async_trait]
pub trait AuditTool: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Install dependencies; a non-zero exit is a failed job.
    async fn install(&self, workspace: &Path) -> Result<CommandOutput, ToolError>;

    /// Produce the JSON report on stdout, exit status notwithstanding.
    async fn scan(&self, workspace: &Path) -> Result<ScanOutput, ToolError>;
}
