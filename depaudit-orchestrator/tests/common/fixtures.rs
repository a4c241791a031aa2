//! Test data fixtures for depaudit-orchestrator

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use depaudit_sandbox::{AuditTool, CommandOutput, ScanOutput, ToolError};

/// A well-formed submission
pub fn submission() -> Value {
    json!({
        "package_json": {
            "name": "fixture-app",
            "version": "1.0.0",
            "dependencies": { "lodash": "4.17.20" }
        },
        "dependencies": { "lodash": "4.17.20" }
    })
}

/// A submission for a package called `name`
pub fn named_submission(name: &str) -> Value {
    json!({
        "package_json": { "name": name, "version": "1.0.0", "dependencies": {} },
        "dependencies": {}
    })
}

/// npm-style audit document with the given high and critical counts
pub fn audit_document(high: u64, critical: u64) -> String {
    json!({
        "auditReportVersion": 2,
        "vulnerabilities": {},
        "metadata": {
            "vulnerabilities": {
                "info": 0, "low": 0, "moderate": 0,
                "high": high, "critical": critical,
                "total": high + critical
            }
        }
    })
    .to_string()
}

/// Tool that installs successfully and always prints `stdout`.
///
/// The scan exit flag is false, as with a real audit that found issues.
pub struct StaticTool {
    pub install_code: i32,
    pub stdout: String,
}

impl StaticTool {
    pub fn reporting(stdout: String) -> Arc<Self> {
        Arc::new(Self {
            install_code: 0,
            stdout,
        })
    }

    pub fn failing_install() -> Arc<Self> {
        Arc::new(Self {
            install_code: 1,
            stdout: String::new(),
        })
    }
}

#[async_trait]
impl AuditTool for StaticTool {
    fn name(&self) -> &str {
        "static"
    }

    async fn install(&self, workspace: &Path) -> Result<CommandOutput, ToolError> {
        assert!(workspace.join("package.json").exists());
        Ok(CommandOutput {
            code: Some(self.install_code),
            stdout: Vec::new(),
            stderr: b"npm ERR! code ETARGET".to_vec(),
        })
    }

    async fn scan(&self, _workspace: &Path) -> Result<ScanOutput, ToolError> {
        Ok(ScanOutput {
            ok: false,
            stdout: self.stdout.clone(),
        })
    }
}

/// Tool whose report is derived from the workspace's package.json.
///
/// The report carries the package name as `project` and the numeric suffix
/// of `app-<n>` as its high count. Scans are counted per package name.
#[derive(Default)]
pub struct ManifestEchoTool {
    pub scans: Mutex<HashMap<String, usize>>,
}

impl ManifestEchoTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scans_of(&self, name: &str) -> usize {
        self.scans.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AuditTool for ManifestEchoTool {
    fn name(&self) -> &str {
        "manifest-echo"
    }

    async fn install(&self, _workspace: &Path) -> Result<CommandOutput, ToolError> {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        Ok(CommandOutput {
            code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    async fn scan(&self, workspace: &Path) -> Result<ScanOutput, ToolError> {
        let raw = tokio::fs::read_to_string(workspace.join("package.json"))
            .await
            .unwrap();
        let package: Value = serde_json::from_str(&raw).unwrap();
        let name = package["name"].as_str().unwrap().to_string();
        let high: u64 = name
            .strip_prefix("app-")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        *self.scans.lock().unwrap().entry(name.clone()).or_default() += 1;

        Ok(ScanOutput {
            ok: high == 0,
            stdout: json!({
                "project": name,
                "metadata": { "vulnerabilities": { "high": high } }
            })
            .to_string(),
        })
    }
}
