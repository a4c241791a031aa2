use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::Value;

use depaudit_core::domain::JobId;

use crate::presentation::controllers::AppState;
use crate::presentation::errors::ApiError;
use crate::presentation::models::{JobDto, JobReportResponse, SubmitRequest, SubmitResponse};

/// POST /api/submit - Enqueue a manifest for auditing
#[utoipa::path(
    post,
    path = "/api/submit",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Job accepted", body = SubmitResponse),
        (status = 400, description = "Invalid submission", body = crate::presentation::models::ErrorResponse),
        (status = 503, description = "Job queue unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let job_id = state.submit_use_case.execute(&body).await?;
    Ok(Json(SubmitResponse {
        job_id: job_id.to_string(),
    }))
}

/// GET /api/job/{id} - Job state and, once completed, its report
#[utoipa::path(
    get,
    path = "/api/job/{id}",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job found; report is null until completed", body = JobReportResponse),
        (status = 404, description = "Job not found, or report not yet readable", body = crate::presentation::models::ErrorResponse),
        (status = 503, description = "Backend unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobReportResponse>, ApiError> {
    let job_id: JobId = id.parse().map_err(|_| ApiError::job_not_found())?;
    let view = state.get_job_use_case.execute(job_id).await?;

    Ok(Json(JobReportResponse {
        job: view.job.into(),
        report: view.report.map(|r| r.into_document()),
    }))
}

/// GET /api/jobs - Completed and failed jobs
#[utoipa::path(
    get,
    path = "/api/jobs",
    responses(
        (status = 200, description = "Finished jobs", body = [JobDto]),
        (status = 503, description = "Job queue unavailable", body = crate::presentation::models::ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobDto>>, ApiError> {
    let jobs = state.list_jobs_use_case.execute().await?;
    Ok(Json(jobs.into_iter().map(JobDto::from).collect()))
}
