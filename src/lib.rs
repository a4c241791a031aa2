//! depaudit - Main application library
//!
//! Wires the queue, report store, sandbox runner and HTTP API together for
//! the `depaudit-server` and `depaudit-worker` binaries.

mod app;
mod signal;

pub use app::{
    AppHandle, build_queue, build_store, build_worker_context, create_app, drain_workers,
};
pub use depaudit_core::{Config, init_tracing};
pub use signal::shutdown_signal;

// Re-export for convenience
pub use depaudit_core;
pub use depaudit_orchestrator;
pub use depaudit_sandbox;
