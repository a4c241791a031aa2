//! Route definitions and middleware stack

use std::time::Duration;

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::Json;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use depaudit_core::config::ServerConfig;

use crate::presentation::controllers::{
    AppState,
    health::{handshake, health_check, metrics},
    jobs::{get_job, list_jobs, submit},
    stats::get_stats,
};
use crate::presentation::models::*;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::jobs::submit,
        crate::presentation::controllers::jobs::get_job,
        crate::presentation::controllers::jobs::list_jobs,
        crate::presentation::controllers::stats::get_stats,
        crate::presentation::controllers::health::health_check,
        crate::presentation::controllers::health::metrics,
        crate::presentation::controllers::health::handshake
    ),
    components(
        schemas(
            SubmitRequest,
            SubmitResponse,
            ErrorResponse,
            JobDto,
            JobReportResponse,
            HealthResponse,
            MetricsResponse,
            HandshakeResponse,
            crate::application::stats::AuditStats,
            depaudit_core::domain::JobState,
            depaudit_core::domain::JobCounts,
            depaudit_core::domain::SeverityCounts
        )
    ),
    tags(
        (name = "jobs", description = "Audit submission and polling"),
        (name = "stats", description = "Aggregate vulnerability statistics"),
        (name = "health", description = "Liveness, queue metrics and service identity")
    ),
    info(
        title = "depaudit API",
        description = "Asynchronous dependency manifest audits: submit a manifest, poll for the report.",
        license(
            name = "AGPL-3.0",
            url = "https://www.gnu.org/licenses/agpl-3.0.html"
        )
    )
)]
pub struct ApiDoc;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| {
                    tracing::warn!(origin, "Invalid CORS origin in config; skipping");
                })
                .ok()
        })
        .collect();
    base.allow_origin(origins)
}

/// Create the application router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .route("/submit", post(submit))
        .route("/job/{id}", get(get_job))
        .route("/jobs", get(list_jobs))
        .route("/stats", get(get_stats))
        .route("/handshake", get(handshake));

    let health_routes = Router::new()
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .merge(health_routes);

    if config.enable_docs {
        router = router.route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_seconds),
        ));

    router.layer(service_builder).with_state(state)
}
