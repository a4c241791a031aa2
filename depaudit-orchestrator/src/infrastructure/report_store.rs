//! Write-once persistence of audit reports

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use depaudit_core::domain::{AuditReport, JobId};

/// Report store errors
#[derive(Debug, thiserror::Error)]
pub enum ReportStoreError {
    /// A report for this job was already written
    #[error("Report for job {0} already exists")]
    AlreadyExists(JobId),

    #[error("Report storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage keyed by job id; a key is written at most once.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn put(&self, job_id: JobId, report: &AuditReport) -> Result<(), ReportStoreError>;

    /// Missing, unreadable and corrupt reports all read as `None`.
    async fn get(&self, job_id: JobId) -> Result<Option<AuditReport>, ReportStoreError>;

    async fn exists(&self, job_id: JobId) -> Result<bool, ReportStoreError>;
}

/// One `<id>.json` file per job.
///
/// Files are written to a temporary sibling and hard-linked into place, so a
/// reader sees either nothing or the complete document.
#[derive(Debug, Clone)]
pub struct FileSystemReportStore {
    dir: PathBuf,
}

impl FileSystemReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }
}

#[async_trait]
impl ReportStore for FileSystemReportStore {
    async fn put(&self, job_id: JobId, report: &AuditReport) -> Result<(), ReportStoreError> {
        let bytes = serde_json::to_vec_pretty(report)?;
        let dir = self.dir.clone();
        let target = self.path_for(job_id);

        tokio::fs::create_dir_all(&dir).await?;

        tokio::task::spawn_blocking(move || -> Result<(), ReportStoreError> {
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist_noclobber(&target).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    ReportStoreError::AlreadyExists(job_id)
                } else {
                    ReportStoreError::Io(e.error)
                }
            })?;
            Ok(())
        })
        .await
        .map_err(|e| ReportStoreError::Io(std::io::Error::other(e.to_string())))??;

        debug!(job_id = %job_id, path = %self.path_for(job_id).display(), "Report persisted");
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<AuditReport>, ReportStoreError> {
        let path = self.path_for(job_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(job_id = %job_id, path = %path.display(), error = %e, "Unreadable report");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<AuditReport>(&bytes) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                warn!(job_id = %job_id, path = %path.display(), error = %e, "Corrupt report");
                Ok(None)
            }
        }
    }

    async fn exists(&self, job_id: JobId) -> Result<bool, ReportStoreError> {
        Ok(tokio::fs::try_exists(self.path_for(job_id)).await?)
    }
}
