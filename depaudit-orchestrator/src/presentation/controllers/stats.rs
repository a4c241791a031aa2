use axum::extract::State;
use axum::response::Json;

use crate::application::stats::AuditStats;
use crate::presentation::controllers::AppState;
use crate::presentation::errors::ApiError;

/// GET /api/stats - Severity totals across completed audits
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Aggregate statistics", body = AuditStats),
        (status = 503, description = "Backend unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "stats"
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<AuditStats>, ApiError> {
    Ok(Json(state.stats_aggregator.compute().await?))
}
