//! Per-job workspace directories
//!
//! Workspaces live under a shared root and are named
//! `depaudit-job-<id>-<random>`, so two executions of the same job (a
//! redelivery after a crash) never share a directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use depaudit_core::domain::JobId;

use crate::domain::traits::SandboxError;

/// Name prefix shared by every workspace directory
pub const WORKSPACE_PREFIX: &str = "depaudit-job-";

/// Creates workspaces under a fixed root
#[derive(Debug, Clone)]
pub struct WorkspaceFactory {
    root: PathBuf,
}

impl WorkspaceFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named directory for one execution of `job_id`.
    pub async fn acquire(&self, job_id: JobId) -> Result<SandboxWorkspace, SandboxError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| SandboxError::CreationFailed {
                root: self.root.display().to_string(),
                source,
            })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", WORKSPACE_PREFIX, job_id))
            .tempdir_in(&self.root)
            .map_err(|source| SandboxError::CreationFailed {
                root: self.root.display().to_string(),
                source,
            })?;

        debug!(job_id = %job_id, path = %dir.path().display(), "Workspace acquired");
        Ok(SandboxWorkspace {
            job_id,
            dir: Some(dir),
        })
    }

    /// Remove workspaces older than `max_age`.
    ///
    /// Only directories carrying [`WORKSPACE_PREFIX`] are touched. Returns the
    /// number of directories removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize, SandboxError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(SandboxError::Io(e)),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(WORKSPACE_PREFIX) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_dir() => metadata,
                _ => continue,
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    removed += 1;
                    info!(path = %path.display(), age_secs = age.as_secs(), "Removed stale workspace");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale workspace");
                }
            }
        }

        Ok(removed)
    }
}

/// An exclusive working directory for one job execution.
///
/// Removed by [`SandboxWorkspace::release`], or on drop if release was never
/// reached.
#[derive(Debug)]
pub struct SandboxWorkspace {
    job_id: JobId,
    dir: Option<TempDir>,
}

impl SandboxWorkspace {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Write the package descriptor as `package.json`.
    pub async fn write_package_json(&self, descriptor: &Value) -> Result<PathBuf, SandboxError> {
        let bytes = serde_json::to_vec_pretty(descriptor)
            .map_err(|e| SandboxError::Materialize(e.to_string()))?;
        let path = self.path().join("package.json");
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SandboxError::Materialize(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// Delete the directory and everything installed into it.
    pub async fn release(mut self) -> Result<(), SandboxError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let path = dir.path().display().to_string();
        let job_id = self.job_id;

        let result = tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| SandboxError::CleanupFailed {
                path: path.clone(),
                source: std::io::Error::other(e.to_string()),
            })?;

        result.map_err(|source| SandboxError::CleanupFailed {
            path: path.clone(),
            source,
        })?;

        debug!(job_id = %job_id, path = %path, "Workspace released");
        Ok(())
    }
}
