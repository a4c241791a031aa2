//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use depaudit_core::domain::{Job, JobCounts, JobState};

/// Submission body
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Package descriptor written verbatim as `package.json`
    #[schema(value_type = Object, example = json!({"name": "demo", "dependencies": {"lodash": "4.17.20"}}))]
    pub package_json: Value,

    /// Dependency name to version constraint
    #[schema(value_type = Object, example = json!({"lodash": "4.17.20"}))]
    pub dependencies: Value,
}

/// Accepted submission
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    #[schema(example = "1")]
    pub job_id: String,
}

/// Error response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Job not found")]
    pub error: String,
}

/// Job record as exposed to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobDto {
    #[schema(example = "1")]
    pub id: String,
    pub state: JobState,
    /// The submitted manifest
    #[schema(value_type = Object)]
    pub data: Value,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
}

impl From<Job> for JobDto {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.to_string(),
            state: job.state,
            data: serde_json::json!({
                "package_json": job.data.package_json,
                "dependencies": job.data.dependencies,
            }),
            attempts: job.attempts,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            failed_reason: job.failed_reason,
        }
    }
}

/// Job state plus its report once completed
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobReportResponse {
    pub job: JobDto,
    /// The scan tool's report; `null` until the job completes
    #[schema(value_type = Option<Object>)]
    pub report: Option<Value>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Queue metrics
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    pub queue: JobCounts,
}

/// Service identity and capabilities
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HandshakeResponse {
    #[schema(example = "depaudit")]
    pub name: String,
    pub version: String,
    pub description: String,
    #[schema(example = json!(["dependency-audit"]))]
    pub capabilities: Vec<String>,
}
