//! Orchestrator use cases

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use depaudit_core::domain::{AuditReport, Job, JobCounts, JobId, JobState, Manifest, ManifestError};

use crate::infrastructure::job_queue::{JobQueue, JobQueueError};
use crate::infrastructure::report_store::{ReportStore, ReportStoreError};

/// Errors surfaced to the presentation layer
#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("{0}")]
    Validation(#[from] ManifestError),

    #[error("Job not found")]
    JobNotFound,

    /// Completed job whose report cannot be read yet
    #[error("Report not found")]
    ReportNotFound(JobId),

    /// Queue or store transport failure
    #[error("{0}")]
    Transport(String),
}

impl From<JobQueueError> for UseCaseError {
    fn from(err: JobQueueError) -> Self {
        match err {
            JobQueueError::NotFound(_) => Self::JobNotFound,
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<ReportStoreError> for UseCaseError {
    fn from(err: ReportStoreError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Validate a submission and enqueue it
pub struct SubmitAuditUseCase {
    queue: Arc<dyn JobQueue>,
}

impl SubmitAuditUseCase {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Invalid bodies are rejected before anything reaches the queue.
    pub async fn execute(&self, body: &Value) -> Result<JobId, UseCaseError> {
        let manifest = Manifest::from_submission(body).inspect_err(|e| {
            warn!(field = ?e.field(), error = %e, "Rejected submission");
        })?;

        let job_id = self.queue.submit(manifest).await?;
        info!(job_id = %job_id, "Audit job submitted");
        Ok(job_id)
    }
}

/// A job and, once it has completed, its report
#[derive(Debug, Clone)]
pub struct JobView {
    pub job: Job,
    pub report: Option<AuditReport>,
}

/// Look up a job for a polling client
pub struct GetJobReportUseCase {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ReportStore>,
}

impl GetJobReportUseCase {
    pub fn new(queue: Arc<dyn JobQueue>, store: Arc<dyn ReportStore>) -> Self {
        Self { queue, store }
    }

    /// Reports are only exposed for completed jobs.
    pub async fn execute(&self, job_id: JobId) -> Result<JobView, UseCaseError> {
        let job = self
            .queue
            .get(job_id)
            .await?
            .ok_or(UseCaseError::JobNotFound)?;

        if job.state != JobState::Completed {
            return Ok(JobView { job, report: None });
        }

        match self.store.get(job_id).await? {
            Some(report) => Ok(JobView {
                job,
                report: Some(report),
            }),
            None => Err(UseCaseError::ReportNotFound(job_id)),
        }
    }
}

/// Finished jobs, completed and failed
pub struct ListJobsUseCase {
    queue: Arc<dyn JobQueue>,
}

impl ListJobsUseCase {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    pub async fn execute(&self) -> Result<Vec<Job>, UseCaseError> {
        Ok(self
            .queue
            .list(&[JobState::Completed, JobState::Failed])
            .await?)
    }
}

/// Per-state job counts
pub struct QueueCountsUseCase {
    queue: Arc<dyn JobQueue>,
}

impl QueueCountsUseCase {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    pub async fn execute(&self) -> Result<JobCounts, UseCaseError> {
        Ok(self.queue.counts_by_state().await?)
    }
}
