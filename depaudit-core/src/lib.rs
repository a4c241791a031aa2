//! depaudit Core - Foundation crate for the depaudit audit pipeline
//!
//! This crate provides the pieces shared by the orchestrator, the sandbox,
//! and the binaries:
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] - Jobs, manifests, reports, and severity counts
//! - [`logging`] - Structured logging with tracing
//!
//! # Configuration
//!
//! ```rust,ignore
//! use depaudit_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `DEPAUDIT__` prefix with double underscore separators:
//!
//! ```bash
//! DEPAUDIT__SERVER__PORT=3000
//! DEPAUDIT__QUEUE__BACKEND=redis
//! ```
//!
//! # Logging
//!
//! ```rust,ignore
//! use depaudit_core::init_tracing;
//!
//! init_tracing(&config.logging)?;
//! ```

pub mod config;
pub mod domain;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
