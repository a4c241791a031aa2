//! Integration tests for API endpoints

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::fixtures::submission;
use common::helpers::{app_without_workers, assert_status, submit};

#[tokio::test]
async fn test_health_endpoint() {
    let app = app_without_workers();
    let response = app.server.get("/healthz").await;
    assert_status(&response, StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_handshake_advertises_dependency_audit() {
    let app = app_without_workers();
    let body = app.server.get("/api/handshake").await.json::<Value>();
    assert_eq!(body["name"], "depaudit");
    assert_eq!(body["capabilities"], json!(["dependency-audit"]));
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_submit_returns_job_id_immediately() {
    let app = app_without_workers();
    let id = submit(&app.server, &submission()).await;
    assert_eq!(id, "1");
}

#[tokio::test]
async fn test_distinct_ids_for_identical_submissions() {
    let app = app_without_workers();
    let a = submit(&app.server, &submission()).await;
    let b = submit(&app.server, &submission()).await;
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_missing_dependencies_is_rejected() {
    let app = app_without_workers();
    let response = app
        .server
        .post("/api/submit")
        .json(&json!({ "package_json": { "name": "x" } }))
        .await;

    assert_status(&response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>(),
        json!({ "error": "\"dependencies\" is required" })
    );

    let metrics = app.server.get("/metrics").await.json::<Value>();
    assert_eq!(metrics["queue"]["waiting"], 0);
}

#[tokio::test]
async fn test_wrong_field_types_are_rejected() {
    let app = app_without_workers();
    let response = app
        .server
        .post("/api/submit")
        .json(&json!({ "package_json": [], "dependencies": {} }))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "\"package_json\" must be of type object"
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app_without_workers();
    let response = app
        .server
        .post("/api/submit")
        .text("{ not json")
        .content_type("application/json")
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = app_without_workers();
    for path in ["/api/job/999", "/api/job/not-a-number"] {
        let response = app.server.get(path).await;
        assert_status(&response, StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>(), json!({ "error": "Job not found" }));
    }
}

#[tokio::test]
async fn test_waiting_job_has_no_report() {
    let app = app_without_workers();
    let id = submit(&app.server, &submission()).await;

    let response = app.server.get(&format!("/api/job/{}", id)).await;
    assert_status(&response, StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["job"]["id"], id.as_str());
    assert_eq!(body["job"]["state"], "waiting");
    assert_eq!(body["job"]["data"]["dependencies"]["lodash"], "4.17.20");
    assert!(body["report"].is_null());
}

#[tokio::test]
async fn test_metrics_counts_waiting_jobs() {
    let app = app_without_workers();
    submit(&app.server, &submission()).await;
    submit(&app.server, &submission()).await;

    let body = app.server.get("/metrics").await.json::<Value>();
    assert_eq!(
        body,
        json!({ "queue": { "waiting": 2, "active": 0, "completed": 0, "failed": 0 } })
    );
}

#[tokio::test]
async fn test_stats_empty() {
    let app = app_without_workers();
    let body = app.server.get("/api/stats").await.json::<Value>();
    assert_eq!(body["total"], 0);
    assert_eq!(body["safe"], 0);
    assert_eq!(body["vulnerable"], 0);
    assert_eq!(body["severity"]["critical"], 0);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = app_without_workers();
    let response = app.server.get("/api-docs/openapi.json").await;
    assert_status(&response, StatusCode::OK);
    let doc = response.json::<Value>();
    assert!(doc["paths"]["/api/submit"].is_object());
}
