//! Test helper functions for depaudit-orchestrator

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use depaudit_core::config::ServerConfig;
use depaudit_orchestrator::application::worker::{WorkerContext, WorkerSettings, spawn_worker_pool};
use depaudit_orchestrator::{AppState, FileSystemReportStore, MemoryJobQueue, create_router};
use depaudit_sandbox::{AuditRunner, AuditTool, WorkspaceFactory};

/// Assert HTTP response has specific status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status_code(),
        expected,
        "Expected status {}, got {}: {}",
        expected,
        response.status_code(),
        response.text()
    );
}

/// A router over an in-process queue and a temporary report store
pub struct TestApp {
    pub server: TestServer,
    pub queue: Arc<MemoryJobQueue>,
    pub store: Arc<FileSystemReportStore>,
    pub dir: TempDir,
    pub shutdown: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Router only; submitted jobs stay `waiting`.
pub fn app_without_workers() -> TestApp {
    build(None, 0)
}

/// Router plus one embedded worker driving `tool`.
pub fn app_with_worker(tool: Arc<dyn AuditTool>) -> TestApp {
    build(Some(tool), 1)
}

/// Router plus `concurrency` embedded workers sharing `tool`.
pub fn app_with_workers(tool: Arc<dyn AuditTool>, concurrency: usize) -> TestApp {
    build(Some(tool), concurrency)
}

fn build(tool: Option<Arc<dyn AuditTool>>, concurrency: usize) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(MemoryJobQueue::new(Duration::from_secs(30)));
    let store = Arc::new(FileSystemReportStore::new(dir.path().join("reports")));
    let shutdown = CancellationToken::new();

    if let Some(tool) = tool {
        let ctx = WorkerContext {
            queue: queue.clone(),
            store: store.clone(),
            runner: Arc::new(AuditRunner::new(
                WorkspaceFactory::new(dir.path().join("workspaces")),
                tool,
            )),
            settings: WorkerSettings {
                claim_timeout: Duration::from_millis(50),
                ..WorkerSettings::default()
            },
        };
        spawn_worker_pool(ctx, concurrency, shutdown.clone());
    }

    let state = AppState::new(queue.clone(), store.clone());
    let router = create_router(state, &ServerConfig::default());

    TestApp {
        server: TestServer::new(router).unwrap(),
        queue,
        store,
        dir,
        shutdown,
    }
}

/// Submit and return the assigned job id
pub async fn submit(server: &TestServer, body: &Value) -> String {
    let response = server.post("/api/submit").json(body).await;
    assert_status(&response, StatusCode::OK);
    response.json::<Value>()["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Poll `GET /api/job/{id}` until the job reaches a terminal state.
pub async fn poll_until_finished(server: &TestServer, id: &str) -> TestResponse {
    for _ in 0..200 {
        let response = server.get(&format!("/api/job/{}", id)).await;
        if response.status_code() == StatusCode::OK {
            let body = response.json::<Value>();
            let state = body["job"]["state"].as_str().unwrap_or_default();
            if state == "completed" || state == "failed" {
                return response;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} never finished", id);
}
