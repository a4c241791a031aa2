//! Orchestrator application layer

pub mod stats;
pub mod use_cases;
pub mod worker;

pub use stats::{AuditStats, StatsAggregator};
pub use use_cases::*;
pub use worker::{AuditWorker, JobOutcome, WorkerContext, WorkerSettings, spawn_worker_pool};
