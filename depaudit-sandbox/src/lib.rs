//! depaudit Sandbox - Isolated execution of the external audit tool
//!
//! Every job runs in its own freshly created workspace directory. The
//! manifest's package descriptor is written there, the install and scan
//! commands run with the workspace as their working directory, and the
//! directory is removed on every exit path.
//!
//! # Architecture
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | domain | [`AuditTool`] | boundary to the opaque install+scan tool |
//! | infrastructure | [`CommandAuditTool`] | child-process implementation (`npm install`, `npm audit --json`) |
//! | infrastructure | [`WorkspaceFactory`] / [`SandboxWorkspace`] | per-job directories |
//! | application | [`AuditRunner`] | the acquire → materialize → install → scan → release sequence |
//!
//! # Exit codes
//!
//! The scan tool signals "vulnerabilities found" through a non-zero exit
//! status while still printing a valid report. Scan results are therefore
//! returned as a [`ScanOutput`] carrying both the exit flag and stdout, and
//! only unusable stdout counts as a failure.
//!
//! # Usage
//!
//! ```rust,ignore
//! use depaudit_sandbox::AuditRunner;
//!
//! let runner = AuditRunner::from_config(&config.sandbox);
//! let report = runner.run(job.id, &job.data).await?;
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::runner::{AuditRunner, ExecutionError};
pub use domain::traits::{AuditTool, CommandOutput, SandboxError, ScanOutput, ToolError};
pub use infrastructure::command::CommandAuditTool;
pub use infrastructure::workspace::{SandboxWorkspace, WORKSPACE_PREFIX, WorkspaceFactory};
