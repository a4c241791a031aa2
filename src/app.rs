//! Application setup and wiring

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use depaudit_core::Config;
use depaudit_core::config::{QueueBackend, QueueConfig};
use depaudit_orchestrator::application::worker::{WorkerContext, WorkerSettings};
use depaudit_orchestrator::{
    AppState, FileSystemReportStore, JobQueue, JobQueueError, MemoryJobQueue, RedisJobQueue,
    ReportStore, create_router, spawn_worker_pool,
};
use depaudit_sandbox::AuditRunner;

/// Handle returned from create_app for graceful shutdown coordination
pub struct AppHandle {
    pub router: Router,
    pub shutdown_token: CancellationToken,
    /// Embedded worker loops; empty when `worker.embedded` is off
    pub workers: Vec<JoinHandle<()>>,
}

impl AppHandle {
    /// Cancel background tasks and wait up to `timeout` for them to finish.
    pub async fn shutdown(self, timeout: Duration) {
        self.shutdown_token.cancel();
        drain_workers(self.workers, timeout).await;
    }
}

/// Connect the configured job queue backend
pub async fn build_queue(config: &QueueConfig) -> Result<Arc<dyn JobQueue>, JobQueueError> {
    match config.backend {
        QueueBackend::Memory => {
            tracing::info!("Using in-process job queue");
            Ok(Arc::new(MemoryJobQueue::from_config(config)))
        }
        QueueBackend::Redis => {
            tracing::info!(prefix = %config.key_prefix, "Connecting Redis job queue");
            Ok(Arc::new(RedisJobQueue::connect(config).await?))
        }
    }
}

/// Report store rooted at `storage.reports_dir`
pub fn build_store(config: &Config) -> Arc<dyn ReportStore> {
    Arc::new(FileSystemReportStore::new(config.storage.reports_dir.clone()))
}

/// Everything a worker loop needs, built from configuration
pub fn build_worker_context(
    config: &Config,
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn ReportStore>,
) -> WorkerContext {
    WorkerContext {
        queue,
        store,
        runner: Arc::new(AuditRunner::from_config(&config.sandbox)),
        settings: WorkerSettings::from_config(config),
    }
}

/// Wait for every handle, giving up after `timeout`.
pub async fn drain_workers(workers: Vec<JoinHandle<()>>, timeout: Duration) {
    if workers.is_empty() {
        return;
    }

    let count = workers.len();
    let joined = tokio::time::timeout(timeout, futures::future::join_all(workers)).await;
    match joined {
        Ok(results) => {
            let panicked = results.iter().filter(|r| r.is_err()).count();
            if panicked > 0 {
                tracing::warn!(panicked, "Some worker tasks ended abnormally");
            }
            tracing::info!(count, "Worker tasks stopped");
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Worker tasks still running at shutdown timeout; abandoning in-flight jobs"
            );
        }
    }
}

/// Create the application router and return an AppHandle for shutdown coordination
pub async fn create_app(
    config: Config,
) -> Result<AppHandle, Box<dyn std::error::Error + Send + Sync>> {
    let shutdown_token = CancellationToken::new();

    let queue = build_queue(&config.queue).await.map_err(|e| {
        tracing::error!("Failed to initialize job queue: {}", e);
        e
    })?;
    let store = build_store(&config);
    tracing::info!(
        reports_dir = %config.storage.reports_dir.display(),
        "Report store ready"
    );

    let workers = if config.worker.embedded {
        let ctx = build_worker_context(&config, queue.clone(), store.clone());
        spawn_worker_pool(ctx, config.worker.concurrency, shutdown_token.clone())
    } else {
        tracing::info!("Embedded workers disabled; run depaudit-worker processes");
        Vec::new()
    };

    let state = AppState::new(queue, store);
    let router = create_router(state, &config.server);

    Ok(AppHandle {
        router,
        shutdown_token,
        workers,
    })
}
