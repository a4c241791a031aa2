//! In-process job queue for tests and single-process deployments

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info};

use depaudit_core::config::QueueConfig;
use depaudit_core::domain::{Job, JobCounts, JobId, JobState, Manifest};

use super::{JobQueue, JobQueueError, Lease, WorkerId};

struct LeaseRecord {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    jobs: BTreeMap<JobId, Job>,
    waiting: VecDeque<JobId>,
    leases: HashMap<JobId, LeaseRecord>,
}

impl QueueState {
    /// Check `lease` is the live lease on an active job.
    fn held(&self, lease: &Lease) -> Result<(), JobQueueError> {
        let id = lease.job_id();
        match self.leases.get(&id) {
            Some(record) if record.token == lease.token && record.expires_at > Instant::now() => {
                Ok(())
            }
            _ => Err(JobQueueError::LeaseLost(id)),
        }
    }

    fn finish(&mut self, lease: &Lease, reason: Option<&str>) -> Result<Job, JobQueueError> {
        self.held(lease)?;
        let id = lease.job_id();
        let job = self.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        match reason {
            Some(reason) => job.fail(reason)?,
            None => job.transition(JobState::Completed)?,
        }
        self.leases.remove(&id);
        Ok(job.clone())
    }
}

/// Mutex-protected queue; waiting claimers are woken through a [`Notify`].
///
/// Not durable across restarts.
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    lease_ttl: Duration,
}

impl MemoryJobQueue {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            lease_ttl,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.lease_ttl())
    }

    async fn try_claim(&self, worker_id: &WorkerId) -> Result<Option<Lease>, JobQueueError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.waiting.pop_back() else {
            return Ok(None);
        };

        let job = state.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        job.transition(JobState::Active)?;
        let lease = Lease::new(job.clone(), worker_id.clone());

        state.leases.insert(
            id,
            LeaseRecord {
                token: lease.token.clone(),
                expires_at: Instant::now() + self.lease_ttl,
            },
        );
        debug!(job_id = %id, worker_id = %worker_id, "Job claimed");
        Ok(Some(lease))
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn submit(&self, manifest: Manifest) -> Result<JobId, JobQueueError> {
        let id = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            let id = JobId::new(state.next_id);
            state.jobs.insert(id, Job::new(id, manifest));
            state.waiting.push_front(id);
            id
        };
        self.notify.notify_one();
        debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobQueueError> {
        Ok(self.state.lock().await.jobs.get(&job_id).cloned())
    }

    async fn list(&self, states: &[JobState]) -> Result<Vec<Job>, JobQueueError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| states.contains(&job.state))
            .cloned()
            .collect())
    }

    async fn counts_by_state(&self) -> Result<JobCounts, JobQueueError> {
        let state = self.state.lock().await;
        let mut counts = JobCounts::default();
        for job in state.jobs.values() {
            counts.increment(job.state);
        }
        Ok(counts)
    }

    async fn claim(
        &self,
        worker_id: &WorkerId,
        wait: Duration,
    ) -> Result<Option<Lease>, JobQueueError> {
        let deadline = Instant::now() + wait;
        loop {
            // Register interest before checking so a submit in between is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(lease) = self.try_claim(worker_id).await? {
                return Ok(Some(lease));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn renew(&self, lease: &Lease) -> Result<(), JobQueueError> {
        let mut state = self.state.lock().await;
        state.held(lease)?;
        if let Some(record) = state.leases.get_mut(&lease.job_id()) {
            record.expires_at = Instant::now() + self.lease_ttl;
        }
        Ok(())
    }

    async fn complete(&self, lease: &Lease) -> Result<Job, JobQueueError> {
        self.state.lock().await.finish(lease, None)
    }

    async fn fail(&self, lease: &Lease, reason: &str) -> Result<Job, JobQueueError> {
        self.state.lock().await.finish(lease, Some(reason))
    }

    async fn requeue_stalled(&self) -> Result<Vec<JobId>, JobQueueError> {
        let now = Instant::now();
        let requeued = {
            let mut state = self.state.lock().await;
            let stalled: Vec<JobId> = state
                .jobs
                .values()
                .filter(|job| job.state == JobState::Active)
                .map(|job| job.id)
                .filter(|id| {
                    state
                        .leases
                        .get(id)
                        .is_none_or(|record| record.expires_at <= now)
                })
                .collect();

            for id in &stalled {
                state.leases.remove(id);
                if let Some(job) = state.jobs.get_mut(id) {
                    job.transition(JobState::Waiting)?;
                }
                state.waiting.push_back(*id);
            }
            stalled
        };

        for id in &requeued {
            info!(job_id = %id, "Requeued stalled job");
            self.notify.notify_one();
        }
        Ok(requeued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(name: &str) -> Manifest {
        Manifest::from_submission(&json!({
            "package_json": { "name": name },
            "dependencies": {}
        }))
        .unwrap()
    }

    fn worker() -> WorkerId {
        WorkerId::new("test-worker")
    }

    #[tokio::test]
    async fn test_ids_are_distinct_and_increasing() {
        let queue = MemoryJobQueue::default();
        let a = queue.submit(manifest("a")).await.unwrap();
        let b = queue.submit(manifest("b")).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_fifo_claim_order() {
        let queue = MemoryJobQueue::default();
        let first = queue.submit(manifest("first")).await.unwrap();
        let second = queue.submit(manifest("second")).await.unwrap();

        let lease = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(lease.job_id(), first);
        assert_eq!(lease.job.state, JobState::Active);
        assert_eq!(lease.job.attempts, 1);

        let lease = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(lease.job_id(), second);
    }

    #[tokio::test]
    async fn test_claim_times_out_when_empty() {
        let queue = MemoryJobQueue::default();
        let lease = queue
            .claim(&worker(), Duration::from_millis(20))
            .await
            .unwrap();
        assert!(lease.is_none());
    }

    #[tokio::test]
    async fn test_blocked_claim_wakes_on_submit() {
        let queue = std::sync::Arc::new(MemoryJobQueue::default());
        let claimer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.claim(&worker(), Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let id = queue.submit(manifest("late")).await.unwrap();

        let lease = claimer.await.unwrap().unwrap().unwrap();
        assert_eq!(lease.job_id(), id);
    }

    #[tokio::test]
    async fn test_complete_and_fail() {
        let queue = MemoryJobQueue::default();
        queue.submit(manifest("ok")).await.unwrap();
        queue.submit(manifest("bad")).await.unwrap();

        let ok = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        let bad = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();

        let done = queue.complete(&ok).await.unwrap();
        assert_eq!(done.state, JobState::Completed);
        assert!(done.finished_at.is_some());

        let failed = queue.fail(&bad, "install failed").await.unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.failed_reason.as_deref(), Some("install failed"));

        let counts = queue.counts_by_state().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.waiting + counts.active, 0);

        let finished = queue
            .list(&[JobState::Completed, JobState::Failed])
            .await
            .unwrap();
        assert_eq!(finished.len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_job_cannot_complete_twice() {
        let queue = MemoryJobQueue::default();
        queue.submit(manifest("once")).await.unwrap();
        let lease = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        queue.complete(&lease).await.unwrap();

        let err = queue.complete(&lease).await.unwrap_err();
        assert!(matches!(err, JobQueueError::LeaseLost(_)));
    }

    #[tokio::test]
    async fn test_expired_lease_is_requeued_and_old_holder_loses_it() {
        let queue = MemoryJobQueue::new(Duration::from_millis(10));
        let id = queue.submit(manifest("stall")).await.unwrap();
        let stale = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(queue.requeue_stalled().await.unwrap(), vec![id]);
        assert_eq!(
            queue.get(id).await.unwrap().unwrap().state,
            JobState::Waiting
        );

        let fresh = queue
            .claim(&WorkerId::new("other"), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.job_id(), id);
        assert_eq!(fresh.job.attempts, 2);

        assert!(matches!(
            queue.complete(&stale).await.unwrap_err(),
            JobQueueError::LeaseLost(_)
        ));
        assert!(matches!(
            queue.renew(&stale).await.unwrap_err(),
            JobQueueError::LeaseLost(_)
        ));
        queue.complete(&fresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_renewed_lease_is_not_stalled() {
        let queue = MemoryJobQueue::new(Duration::from_millis(50));
        queue.submit(manifest("busy")).await.unwrap();
        let lease = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            queue.renew(&lease).await.unwrap();
        }
        assert!(queue.requeue_stalled().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requeued_job_goes_to_head() {
        let queue = MemoryJobQueue::new(Duration::from_millis(10));
        let stalled = queue.submit(manifest("stalled")).await.unwrap();
        let _lease = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        let later = queue.submit(manifest("later")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        queue.requeue_stalled().await.unwrap();

        let next = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(next.job_id(), stalled);
        let after = queue.claim(&worker(), Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(after.job_id(), later);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let queue = MemoryJobQueue::default();
        assert!(queue.get(JobId::new(42)).await.unwrap().is_none());
    }
}
