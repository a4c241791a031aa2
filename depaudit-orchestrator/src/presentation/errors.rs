//! Mapping of application errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::{error, warn};

use crate::application::use_cases::UseCaseError;
use crate::presentation::models::ErrorResponse;

/// Errors returned by the HTTP handlers, rendered as `{"error": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn job_not_found() -> Self {
        Self::NotFound("Job not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<UseCaseError> for ApiError {
    fn from(err: UseCaseError) -> Self {
        match err {
            UseCaseError::Validation(e) => Self::BadRequest(e.to_string()),
            UseCaseError::JobNotFound => Self::job_not_found(),
            UseCaseError::ReportNotFound(job_id) => {
                warn!(job_id = %job_id, "Completed job has no readable report");
                Self::NotFound("Report not found".to_string())
            }
            UseCaseError::Transport(message) => {
                error!(error = %message, "Backend unavailable");
                Self::ServiceUnavailable(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depaudit_core::domain::{JobId, ManifestError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                UseCaseError::Validation(ManifestError::Missing {
                    field: "dependencies",
                }),
                StatusCode::BAD_REQUEST,
                "\"dependencies\" is required",
            ),
            (UseCaseError::JobNotFound, StatusCode::NOT_FOUND, "Job not found"),
            (
                UseCaseError::ReportNotFound(JobId::new(1)),
                StatusCode::NOT_FOUND,
                "Report not found",
            ),
            (
                UseCaseError::Transport("connection refused".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "connection refused",
            ),
        ];

        for (err, status, message) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status(), status);
            assert_eq!(api.to_string(), message);
        }
    }
}
