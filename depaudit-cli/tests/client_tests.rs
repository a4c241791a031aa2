//! Polling behavior against a mock server

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use depaudit_cli::{AuditClient, ClientError, PollOutcome};

fn job_body(state: &str) -> serde_json::Value {
    json!({
        "job": { "id": "7", "state": state, "attempts": 1 },
        "report": null
    })
}

#[tokio::test]
async fn test_submit_returns_job_id() {
    let server = MockServer::start().await;
    let body = json!({ "package_json": {}, "dependencies": {} });
    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "7" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuditClient::new(&server.uri()).unwrap();
    assert_eq!(client.submit(&body).await.unwrap(), "7");
}

#[tokio::test]
async fn test_submit_validation_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": "\"dependencies\" is required" })),
        )
        .mount(&server)
        .await;

    let client = AuditClient::new(&server.uri()).unwrap();
    let err = client.submit(&json!({})).await.unwrap_err();
    match err {
        ClientError::Rejected { status, message } => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(message, "\"dependencies\" is required");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_poll_tolerates_not_found_then_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job/7"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Job not found" })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/job/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body("active")))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/job/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job": { "id": "7", "state": "completed", "attempts": 1 },
            "report": { "metadata": { "vulnerabilities": { "high": 1 } } }
        })))
        .with_priority(3)
        .mount(&server)
        .await;

    let client = AuditClient::new(&server.uri()).unwrap();
    let outcome = client.poll("7", 5, Duration::ZERO).await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Completed(json!({ "metadata": { "vulnerabilities": { "high": 1 } } }))
    );
}

#[tokio::test]
async fn test_poll_reports_failure_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job": { "id": "7", "state": "failed", "failed_reason": "npm install exited with code 1" },
            "report": null
        })))
        .mount(&server)
        .await;

    let client = AuditClient::new(&server.uri()).unwrap();
    let outcome = client.poll("7", 3, Duration::ZERO).await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Failed("npm install exited with code 1".to_string())
    );
}

#[tokio::test]
async fn test_poll_exhausts_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/job/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body("waiting")))
        .expect(3)
        .mount(&server)
        .await;

    let client = AuditClient::new(&server.uri()).unwrap();
    let outcome = client.poll("7", 3, Duration::ZERO).await.unwrap();
    assert_eq!(outcome, PollOutcome::Exhausted);
}

#[tokio::test]
async fn test_server_error_is_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": "queue unavailable" })),
        )
        .mount(&server)
        .await;

    let client = AuditClient::new(&server.uri()).unwrap();
    let err = client.stats().await.unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let client = AuditClient::new("http://127.0.0.1:1").unwrap();
    let err = client.job("1").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
