//! Orchestrator infrastructure

pub mod job_queue;
pub mod report_store;

pub use job_queue::*;
pub use report_store::*;
