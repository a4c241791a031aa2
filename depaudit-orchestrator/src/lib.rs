//! depaudit Orchestrator - Job pipeline and HTTP surface
//!
//! This crate owns everything between a submission and a retrievable report:
//! the job queue, the write-once report store, the worker loop that drives
//! the sandboxed audit runner, the stats aggregator, and the axum API.
//!
//! # Architecture
//!
//! ```text
//! depaudit-orchestrator/
//! ├── presentation/     # HTTP layer
//! │   ├── controllers/  # Request handlers
//! │   ├── models.rs     # DTOs with OpenAPI schemas
//! │   ├── errors.rs     # ApiError -> HTTP response
//! │   └── routes.rs     # Router and middleware stack
//! ├── application/      # Use cases
//! │   ├── use_cases.rs  # Submit, poll, list
//! │   ├── stats.rs      # Report aggregation
//! │   └── worker.rs     # Background job processor
//! └── infrastructure/   # External integrations
//!     ├── job_queue/    # In-process and Redis queues
//!     └── report_store.rs
//! ```
//!
//! # API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/submit` | POST | Enqueue a manifest for auditing |
//! | `/api/job/{id}` | GET | Job state and, once completed, its report |
//! | `/api/jobs` | GET | Finished jobs |
//! | `/api/stats` | GET | Aggregate severity statistics |
//! | `/api/handshake` | GET | Service identity and capabilities |
//! | `/healthz` | GET | Liveness |
//! | `/metrics` | GET | Queue counts |

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::stats::{AuditStats, StatsAggregator};
pub use application::worker::{AuditWorker, WorkerContext, spawn_worker_pool};
pub use infrastructure::job_queue::{
    JobQueue, JobQueueError, Lease, MemoryJobQueue, RedisJobQueue, WorkerId,
};
pub use infrastructure::report_store::{FileSystemReportStore, ReportStore, ReportStoreError};
pub use presentation::{AppState, create_router};
