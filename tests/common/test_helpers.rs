//! Configuration builder and server helpers for application tests

use std::time::Duration;

use axum_test::TestServer;
use serde_json::Value;
use tempfile::TempDir;

use depaudit::depaudit_core::config::CommandConfig;
use depaudit::{AppHandle, Config, create_app};

/// Test configuration builder for creating consistent test configurations
pub struct TestConfigBuilder {
    config: Config,
    dir: TempDir,
}

impl TestConfigBuilder {
    /// Defaults with reports and workspaces under a fresh temporary directory
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.reports_dir = dir.path().join("reports");
        config.sandbox.workspace_root = dir.path().join("workspaces");
        config.queue.claim_timeout_seconds = 1;
        Self { config, dir }
    }

    pub fn without_workers(mut self) -> Self {
        self.config.worker.embedded = false;
        self
    }

    /// Replace npm with shell commands
    pub fn with_commands(mut self, install: &str, scan: &str) -> Self {
        self.config.sandbox.install_command = CommandConfig::new("sh", &["-c", install]);
        self.config.sandbox.scan_command = CommandConfig::new("sh", &["-c", scan]);
        self
    }

    pub fn with_step_timeout(mut self, seconds: u64) -> Self {
        self.config.sandbox.step_timeout_seconds = seconds;
        self
    }

    pub fn build(self) -> (Config, TempDir) {
        (self.config, self.dir)
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running application plus the directory its files live in
pub struct TestApplication {
    pub server: TestServer,
    pub handle: AppHandle,
    pub dir: TempDir,
}

impl TestApplication {
    pub async fn start(builder: TestConfigBuilder) -> Self {
        let (config, dir) = builder.build();
        let handle = create_app(config).await.unwrap();
        let server = TestServer::new(handle.router.clone()).unwrap();
        Self {
            server,
            handle,
            dir,
        }
    }

    pub async fn submit(&self, body: &Value) -> String {
        let response = self.server.post("/api/submit").json(body).await;
        response.assert_status_ok();
        response.json::<Value>()["job_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Poll until the job is completed or failed, returning the last body
    pub async fn wait_for(&self, id: &str, deadline: Duration) -> Value {
        let start = std::time::Instant::now();
        loop {
            let body = self
                .server
                .get(&format!("/api/job/{}", id))
                .await
                .json::<Value>();
            let state = body["job"]["state"].as_str().unwrap_or_default();
            if state == "completed" || state == "failed" {
                return body;
            }
            assert!(start.elapsed() < deadline, "job {} still {}", id, state);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn stop(self) {
        self.handle.shutdown(Duration::from_secs(5)).await;
    }
}
