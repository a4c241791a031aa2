//! One audit execution, start to finish

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use depaudit_core::config::SandboxConfig;
use depaudit_core::domain::{AuditReport, JobId, Manifest, ReportShapeError};

use crate::domain::traits::{AuditTool, SandboxError, ToolError};
use crate::infrastructure::command::CommandAuditTool;
use crate::infrastructure::workspace::{SandboxWorkspace, WorkspaceFactory};

/// Characters of install stderr kept in the failure reason
const STDERR_TAIL_CHARS: usize = 2000;

/// Why an execution produced no report
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("workspace error: {0}")]
    Workspace(#[from] SandboxError),

    #[error("dependency install failed (exit code {code:?}): {stderr}")]
    InstallFailed { code: Option<i32>, stderr: String },

    #[error("audit tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("scan produced no usable report: {0}")]
    ScanFailed(String),

    #[error("malformed report: {0}")]
    MalformedReport(ReportShapeError),
}

impl From<ReportShapeError> for ExecutionError {
    fn from(err: ReportShapeError) -> Self {
        match err {
            ReportShapeError::NotAnObject | ReportShapeError::ToolError(_) => {
                Self::ScanFailed(err.to_string())
            }
            other => Self::MalformedReport(other),
        }
    }
}

/// Runs the acquire, materialize, install, scan, release sequence
pub struct AuditRunner {
    workspaces: WorkspaceFactory,
    tool: Arc<dyn AuditTool>,
}

impl AuditRunner {
    pub fn new(workspaces: WorkspaceFactory, tool: Arc<dyn AuditTool>) -> Self {
        Self { workspaces, tool }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            WorkspaceFactory::new(&config.workspace_root),
            Arc::new(CommandAuditTool::from_config(config)),
        )
    }

    pub fn workspaces(&self) -> &WorkspaceFactory {
        &self.workspaces
    }

    /// Audit `manifest` in a fresh workspace.
    ///
    /// The workspace is removed whether or not a report was produced.
    #[instrument(skip(self, manifest), fields(tool = self.tool.name()))]
    pub async fn run(
        &self,
        job_id: JobId,
        manifest: &Manifest,
    ) -> Result<AuditReport, ExecutionError> {
        let workspace = self.workspaces.acquire(job_id).await?;
        let result = self.run_in(&workspace, manifest).await;

        if let Err(e) = workspace.release().await {
            warn!(job_id = %job_id, error = %e, "Failed to remove workspace");
        }

        match &result {
            Ok(report) => {
                let counts = report.vulnerability_counts();
                info!(
                    job_id = %job_id,
                    vulnerabilities = counts.total(),
                    critical = counts.critical,
                    high = counts.high,
                    "Audit finished"
                );
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "Audit failed"),
        }
        result
    }

    async fn run_in(
        &self,
        workspace: &SandboxWorkspace,
        manifest: &Manifest,
    ) -> Result<AuditReport, ExecutionError> {
        workspace
            .write_package_json(&manifest.package_descriptor())
            .await?;

        let install = match self.tool.install(workspace.path()).await {
            Ok(output) => output,
            Err(ToolError::Timeout { command, timeout }) => {
                return Err(ExecutionError::InstallFailed {
                    code: None,
                    stderr: format!("`{}` timed out after {:?}", command, timeout),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if !install.success() {
            return Err(ExecutionError::InstallFailed {
                code: install.code,
                stderr: install.stderr_tail(STDERR_TAIL_CHARS),
            });
        }

        let scan = self.tool.scan(workspace.path()).await?;
        debug!(ok = scan.ok, bytes = scan.stdout.len(), "Scan output captured");

        let stdout = scan.stdout.trim();
        if stdout.is_empty() {
            return Err(ExecutionError::ScanFailed("empty output".to_string()));
        }
        let document: serde_json::Value = serde_json::from_str(stdout)
            .map_err(|e| ExecutionError::ScanFailed(format!("invalid JSON: {}", e)))?;

        Ok(AuditReport::from_scan_output(document)?)
    }
}
