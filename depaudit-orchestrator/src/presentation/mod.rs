//! Orchestrator presentation layer

pub mod controllers;
pub mod errors;
pub mod models;
pub mod routes;

pub use controllers::AppState;
pub use errors::ApiError;
pub use models::*;
pub use routes::{ApiDoc, create_router};
