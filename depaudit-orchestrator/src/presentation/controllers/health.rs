//! Liveness, metrics and service identity

use axum::extract::State;
use axum::response::Json;

use crate::presentation::controllers::AppState;
use crate::presentation::errors::ApiError;
use crate::presentation::models::{HandshakeResponse, HealthResponse, MetricsResponse};

/// Capability tags advertised by the handshake
pub const CAPABILITIES: &[&str] = &["dependency-audit"];

/// GET /healthz - Liveness probe
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /metrics - Job counts per state
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Queue counts", body = MetricsResponse),
        (status = 503, description = "Job queue unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "health"
)]
pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    let queue = state.queue_counts_use_case.execute().await?;
    Ok(Json(MetricsResponse { queue }))
}

/// GET /api/handshake - Static service descriptor
#[utoipa::path(
    get,
    path = "/api/handshake",
    responses(
        (status = 200, description = "Service identity", body = HandshakeResponse)
    ),
    tag = "health"
)]
pub async fn handshake() -> Json<HandshakeResponse> {
    Json(HandshakeResponse {
        name: "depaudit".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Dependency manifest security audit server".to_string(),
        capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
    })
}
