//! Domain model for the audit pipeline

pub mod job;
pub mod manifest;
pub mod report;

pub use job::{Job, JobCounts, JobId, JobIdParseError, JobState, JobTransitionError};
pub use manifest::{Manifest, ManifestError};
pub use report::{AuditReport, ReportShapeError, Severity, SeverityCounts};
