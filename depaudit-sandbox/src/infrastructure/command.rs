//! Child-process implementation of [`AuditTool`]

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use depaudit_core::config::{CommandConfig, SandboxConfig};

use crate::domain::traits::{AuditTool, CommandOutput, ScanOutput, ToolError};

/// Runs the configured install and scan commands as child processes.
///
/// Each child is killed if its step exceeds `timeout`.
#[derive(Debug, Clone)]
pub struct CommandAuditTool {
    install: CommandConfig,
    scan: CommandConfig,
    timeout: Duration,
}

impl CommandAuditTool {
    pub fn new(install: CommandConfig, scan: CommandConfig, timeout: Duration) -> Self {
        Self {
            install,
            scan,
            timeout,
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            config.install_command.clone(),
            config.scan_command.clone(),
            config.step_timeout(),
        )
    }

    async fn execute(
        &self,
        command: &CommandConfig,
        workspace: &Path,
    ) -> Result<CommandOutput, ToolError> {
        let rendered = command.to_string();
        debug!(command = %rendered, cwd = %workspace.display(), "Spawning child process");

        let child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout {
                command: rendered.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| ToolError::Wait {
                command: rendered.clone(),
                source,
            })?;

        let output = CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        };

        debug!(
            command = %rendered,
            exit_code = ?output.code,
            stdout_bytes = output.stdout.len(),
            "Child process finished"
        );
        Ok(output)
    }
}

#[async_trait]
impl AuditTool for CommandAuditTool {
    fn name(&self) -> &str {
        &self.scan.program
    }

    #[instrument(skip(self), fields(command = %self.install))]
    async fn install(&self, workspace: &Path) -> Result<CommandOutput, ToolError> {
        let output = self.execute(&self.install, workspace).await?;
        if !output.success() {
            warn!(exit_code = ?output.code, "Install step failed");
        }
        Ok(output)
    }

    #[instrument(skip(self), fields(command = %self.scan))]
    async fn scan(&self, workspace: &Path) -> Result<ScanOutput, ToolError> {
        let output = self.execute(&self.scan, workspace).await?;
        if !output.success() {
            debug!(exit_code = ?output.code, "Scan exited non-zero, using stdout anyway");
        }
        Ok(ScanOutput::from(output))
    }
}
