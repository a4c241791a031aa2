//! Background workers that claim jobs and drive the audit runner

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use depaudit_core::Config;
use depaudit_sandbox::AuditRunner;

use crate::infrastructure::job_queue::{JobQueue, JobQueueError, Lease, WorkerId};
use crate::infrastructure::report_store::{ReportStore, ReportStoreError};

/// Timing knobs for the worker loop
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// How long one claim call waits for a job
    pub claim_timeout: Duration,
    /// Interval between lease renewals while a job runs
    pub heartbeat_interval: Duration,
    pub stalled_check_interval: Duration,
    /// Pause after a queue transport error
    pub error_backoff: Duration,
    pub stale_workspace_max_age: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        let lease_ttl = config.queue.lease_ttl();
        Self {
            claim_timeout: config.queue.claim_timeout(),
            heartbeat_interval: (lease_ttl / 3).max(Duration::from_millis(10)),
            stalled_check_interval: config.queue.stalled_check_interval(),
            error_backoff: Duration::from_secs(5),
            stale_workspace_max_age: config.sandbox.stale_workspace_max_age(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Shared dependencies required by the job workers.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn ReportStore>,
    pub runner: Arc<AuditRunner>,
    pub settings: WorkerSettings,
}

/// What happened to a claimed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    /// The lease was lost before the terminal transition; another worker owns the job now.
    Abandoned,
}

/// One worker loop, processing a single job at a time
pub struct AuditWorker {
    id: WorkerId,
    ctx: WorkerContext,
}

impl AuditWorker {
    pub fn new(id: WorkerId, ctx: WorkerContext) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Claim and process jobs until `shutdown` fires.
    ///
    /// Shutdown stops further claims; a job already in flight runs to its
    /// terminal transition.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(worker_id = %self.id, "Worker started");
        let interval = self.ctx.settings.stalled_check_interval;
        let mut next_stalled_check = Instant::now();

        while !shutdown.is_cancelled() {
            if Instant::now() >= next_stalled_check {
                if let Err(e) = self.ctx.queue.requeue_stalled().await {
                    warn!(worker_id = %self.id, error = %e, "Stalled job check failed");
                }
                next_stalled_check = Instant::now() + interval;
            }

            let claimed = tokio::select! {
                _ = shutdown.cancelled() => break,
                claimed = self.ctx.queue.claim(&self.id, self.ctx.settings.claim_timeout) => claimed,
            };

            match claimed {
                Ok(Some(lease)) => {
                    self.process(lease).await;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Failed to poll job queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.ctx.settings.error_backoff) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.id, "Worker stopped");
    }

    /// Claim at most one job, waiting up to the configured claim timeout.
    pub async fn process_next(&self) -> Result<Option<JobOutcome>, JobQueueError> {
        match self
            .ctx
            .queue
            .claim(&self.id, self.ctx.settings.claim_timeout)
            .await?
        {
            Some(lease) => Ok(Some(self.process(lease).await)),
            None => Ok(None),
        }
    }

    /// Run a claimed job to its terminal transition.
    ///
    /// The report is persisted before `complete`, so a completed job always
    /// has a readable report. A redelivered job whose report already exists
    /// is completed without running the audit again.
    pub async fn process(&self, lease: Lease) -> JobOutcome {
        let job_id = lease.job_id();
        info!(
            worker_id = %self.id,
            job_id = %job_id,
            attempt = lease.job.attempts,
            "Processing audit job"
        );

        let heartbeat_stop = CancellationToken::new();
        let heartbeat = self.spawn_heartbeat(lease.clone(), heartbeat_stop.clone());

        let result = if self.report_persisted(&lease).await {
            info!(job_id = %job_id, "Report persisted by an earlier attempt; skipping audit");
            Ok(())
        } else {
            self.audit_and_persist(&lease).await
        };

        heartbeat_stop.cancel();
        if let Err(e) = heartbeat.await {
            warn!(job_id = %job_id, error = %e, "Heartbeat task ended abnormally");
        }

        let transition = match &result {
            Ok(()) => self.ctx.queue.complete(&lease).await,
            Err(reason) => self.ctx.queue.fail(&lease, reason).await,
        };

        match (transition, result) {
            (Ok(_), Ok(())) => {
                info!(worker_id = %self.id, job_id = %job_id, "Audit job completed");
                JobOutcome::Completed
            }
            (Ok(_), Err(reason)) => {
                warn!(worker_id = %self.id, job_id = %job_id, reason = %reason, "Audit job failed");
                JobOutcome::Failed(reason)
            }
            (Err(JobQueueError::LeaseLost(_)), _) => {
                warn!(worker_id = %self.id, job_id = %job_id, "Lease lost before job finished");
                JobOutcome::Abandoned
            }
            (Err(e), _) => {
                error!(worker_id = %self.id, job_id = %job_id, error = %e, "Failed to record job outcome");
                JobOutcome::Abandoned
            }
        }
    }

    /// Whether a previous delivery of this job already stored its report.
    ///
    /// A store error is logged and treated as "not persisted" so the audit runs.
    async fn report_persisted(&self, lease: &Lease) -> bool {
        match self.ctx.store.exists(lease.job_id()).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(job_id = %lease.job_id(), error = %e, "Failed to check for an existing report");
                false
            }
        }
    }

    async fn audit_and_persist(&self, lease: &Lease) -> Result<(), String> {
        let job_id = lease.job_id();
        match self.ctx.runner.run(job_id, &lease.job.data).await {
            Ok(report) => match self.ctx.store.put(job_id, &report).await {
                Ok(()) => Ok(()),
                Err(ReportStoreError::AlreadyExists(_)) => {
                    info!(job_id = %job_id, "Report already persisted by an earlier attempt");
                    Ok(())
                }
                Err(e) => Err(format!("failed to persist report: {}", e)),
            },
            Err(e) => Err(e.to_string()),
        }
    }

    fn spawn_heartbeat(&self, lease: Lease, stop: CancellationToken) -> JoinHandle<()> {
        let queue = self.ctx.queue.clone();
        let period = self.ctx.settings.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match queue.renew(&lease).await {
                    Ok(()) => debug!(job_id = %lease.job_id(), "Lease renewed"),
                    Err(JobQueueError::LeaseLost(id)) => {
                        warn!(job_id = %id, "Lease lost during execution");
                        break;
                    }
                    Err(e) => warn!(job_id = %lease.job_id(), error = %e, "Lease renewal failed"),
                }
            }
        })
    }
}

/// Remove workspaces left behind by killed worker processes.
pub async fn sweep_stale_workspaces(ctx: &WorkerContext) {
    match ctx
        .runner
        .workspaces()
        .sweep_stale(ctx.settings.stale_workspace_max_age)
        .await
    {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Swept stale workspaces"),
        Err(e) => warn!(error = %e, "Failed to sweep stale workspaces"),
    }
}

/// Spawn `concurrency` independent worker loops.
pub fn spawn_worker_pool(
    ctx: WorkerContext,
    concurrency: usize,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let concurrency = concurrency.max(1);
    info!("Job worker pool starting with concurrency: {}", concurrency);

    let sweep = {
        let ctx = ctx.clone();
        tokio::spawn(async move { sweep_stale_workspaces(&ctx).await })
    };
    let mut handles = vec![sweep];

    for _ in 0..concurrency {
        let worker = AuditWorker::new(WorkerId::generate("worker"), ctx.clone());
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move { worker.run(shutdown).await }));
    }
    handles
}
