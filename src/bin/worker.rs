//! depaudit - Standalone worker entry point
//!
//! Claims jobs from the shared Redis queue and audits them. Run as many of
//! these processes as the host allows; each also runs `worker.concurrency`
//! loops.

use tokio_util::sync::CancellationToken;

use depaudit::depaudit_core::config::QueueBackend;
use depaudit::depaudit_orchestrator::spawn_worker_pool;
use depaudit::{
    Config, build_queue, build_store, build_worker_context, drain_workers, init_tracing,
    shutdown_signal,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = Config::load().map_err(|e| {
        std::io::Error::other(format!(
            "Failed to load configuration. Check config/ and DEPAUDIT__* env vars: {}",
            e
        ))
    })?;

    init_tracing(&config.logging)?;

    // An in-process queue is private to one process, so a separate worker would never see jobs.
    if config.queue.backend != QueueBackend::Redis {
        return Err(std::io::Error::other(
            "depaudit-worker requires DEPAUDIT__QUEUE__BACKEND=redis; \
             with the memory backend use the server's embedded workers",
        )
        .into());
    }

    let queue = build_queue(&config.queue).await?;
    let store = build_store(&config);
    let ctx = build_worker_context(&config, queue, store);
    let drain_timeout = config.worker.drain_timeout();

    tracing::info!(
        concurrency = config.worker.concurrency,
        scan_command = %config.sandbox.scan_command,
        "Starting depaudit worker"
    );

    let shutdown = CancellationToken::new();
    let workers = spawn_worker_pool(ctx, config.worker.concurrency, shutdown.clone());

    shutdown_signal().await;
    shutdown.cancel();
    drain_workers(workers, drain_timeout).await;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
