//! Durable FIFO of audit jobs with lease-based exclusive claiming
//!
//! The queue is the single source of truth for job state. Workers take jobs
//! through [`JobQueue::claim`], which hands out a [`Lease`]; only the lease
//! holder may complete or fail the job. A lease that is not renewed expires,
//! and [`JobQueue::requeue_stalled`] returns the job to the waiting list so
//! another worker can run it (at-least-once delivery).

mod memory;
mod redis_queue;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use depaudit_core::domain::{Job, JobCounts, JobId, JobState, JobTransitionError, Manifest};

pub use self::memory::MemoryJobQueue;
pub use self::redis_queue::RedisJobQueue;

/// Job queue errors
#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    /// The queue transport cannot be reached
    #[error("Job queue unavailable: {0}")]
    Unavailable(String),

    /// The lease expired and the job may have been handed to another worker
    #[error("Lease on job {0} lost")]
    LeaseLost(JobId),

    #[error("Job {job} cannot move from {from} to {to}")]
    InvalidTransition {
        job: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<JobTransitionError> for JobQueueError {
    fn from(err: JobTransitionError) -> Self {
        Self::InvalidTransition {
            job: err.job_id,
            from: err.from,
            to: err.to,
        }
    }
}

impl From<serde_json::Error> for JobQueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Identity of a worker loop, recorded in logs alongside its leases
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `<prefix>-<short random suffix>`
    pub fn generate(prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", prefix, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exclusive right to process one job.
///
/// The token is random per claim, so a redelivered job gets a new lease and
/// the previous holder's calls fail with [`JobQueueError::LeaseLost`].
#[derive(Debug, Clone)]
pub struct Lease {
    pub job: Job,
    pub token: String,
    pub worker_id: WorkerId,
}

impl Lease {
    pub(crate) fn new(job: Job, worker_id: WorkerId) -> Self {
        Self {
            job,
            token: Uuid::new_v4().to_string(),
            worker_id,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job.id
    }
}

/// Queue of audit jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue in `waiting` under a fresh, never-reused id.
    async fn submit(&self, manifest: Manifest) -> Result<JobId, JobQueueError>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobQueueError>;

    /// Jobs in any of `states`, ordered by id.
    async fn list(&self, states: &[JobState]) -> Result<Vec<Job>, JobQueueError>;

    async fn counts_by_state(&self) -> Result<JobCounts, JobQueueError>;

    /// Move the oldest waiting job to `active` under a new lease, waiting up to
    /// `wait` for one to arrive.
    async fn claim(
        &self,
        worker_id: &WorkerId,
        wait: Duration,
    ) -> Result<Option<Lease>, JobQueueError>;

    /// Extend the lease by the configured TTL.
    async fn renew(&self, lease: &Lease) -> Result<(), JobQueueError>;

    /// `active -> completed`; requires the lease.
    async fn complete(&self, lease: &Lease) -> Result<Job, JobQueueError>;

    /// `active -> failed`; requires the lease.
    async fn fail(&self, lease: &Lease, reason: &str) -> Result<Job, JobQueueError>;

    /// Return `active` jobs whose lease expired to the head of the waiting list.
    async fn requeue_stalled(&self) -> Result<Vec<JobId>, JobQueueError>;
}
