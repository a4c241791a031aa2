//! HTTP client for the depaudit server

use std::str::FromStr;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use depaudit_core::domain::JobState;

/// Errors talking to the server
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),

    #[error("Server unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a 4xx
    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    /// The server answered with a 5xx
    #[error("Server unavailable ({status}): {message}")]
    Unavailable { status: StatusCode, message: String },

    #[error("Unexpected response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Whether the failure is the server's reachability rather than the request
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unavailable { .. })
    }
}

/// Result of polling a job to completion
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The job completed; carries the report document
    Completed(Value),
    /// The job failed permanently
    Failed(String),
    /// Every attempt found the report not yet available
    Exhausted,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the submission and polling endpoints
#[derive(Debug, Clone)]
pub struct AuditClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuditClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("depaudit-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/submit, returning the assigned job id
    pub async fn submit(&self, body: &Value) -> Result<String, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/submit", self.base_url))
            .json(body)
            .send()
            .await?;

        let response = check(response).await?;
        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        Ok(submitted.job_id)
    }

    /// GET /api/job/{id}; `None` when the server answers 404
    pub async fn job(&self, id: &str) -> Result<Option<Value>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/job/{}", self.base_url, id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        let body = response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))?;
        Ok(Some(body))
    }

    /// GET /api/stats
    pub async fn stats(&self) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/stats", self.base_url))
            .send()
            .await?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }

    /// Poll a job up to `attempts` times, sleeping `interval` between tries.
    ///
    /// A 404 counts as "not yet available", as does a completed job whose
    /// report the server cannot serve yet.
    pub async fn poll(
        &self,
        id: &str,
        attempts: u32,
        interval: Duration,
    ) -> Result<PollOutcome, ClientError> {
        for attempt in 1..=attempts {
            if let Some(body) = self.job(id).await? {
                if let Some(outcome) = interpret(&body)? {
                    return Ok(outcome);
                }
            }

            debug!(job_id = id, attempt, attempts, "Report not yet available");
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(PollOutcome::Exhausted)
    }
}

/// Map a job body to a terminal outcome, or `None` while it is still pending
fn interpret(body: &Value) -> Result<Option<PollOutcome>, ClientError> {
    let state = body["job"]["state"]
        .as_str()
        .ok_or_else(|| ClientError::Malformed("job.state missing".to_string()))?;
    let state = JobState::from_str(state).map_err(ClientError::Malformed)?;

    Ok(match state {
        JobState::Completed => match &body["report"] {
            Value::Null => None,
            report => Some(PollOutcome::Completed(report.clone())),
        },
        JobState::Failed => {
            let reason = body["job"]["failed_reason"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            Some(PollOutcome::Failed(reason))
        }
        JobState::Waiting | JobState::Active => None,
    })
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);

    if status.is_server_error() {
        Err(ClientError::Unavailable { status, message })
    } else {
        Err(ClientError::Rejected { status, message })
    }
}
