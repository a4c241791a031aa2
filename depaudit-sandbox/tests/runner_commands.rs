//! AuditRunner against real child processes
#![cfg(unix)]

use std::time::Duration;

use depaudit_core::config::{CommandConfig, SandboxConfig};
use depaudit_core::domain::{JobId, Manifest};
use depaudit_sandbox::{AuditRunner, ExecutionError};
use serde_json::json;

fn config(root: &std::path::Path, install: &str, scan: &str) -> SandboxConfig {
    SandboxConfig {
        workspace_root: root.to_path_buf(),
        install_command: CommandConfig::new("sh", &["-c", install]),
        scan_command: CommandConfig::new("sh", &["-c", scan]),
        step_timeout_seconds: 10,
        stale_workspace_max_age_seconds: 3600,
    }
}

fn manifest() -> Manifest {
    Manifest::from_submission(&json!({
        "package_json": { "name": "fixture", "dependencies": { "minimist": "0.0.8" } },
        "dependencies": { "minimist": "0.0.8" }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_scan_exit_code_ignored_when_stdout_is_a_report() {
    let root = tempfile::tempdir().unwrap();
    let runner = AuditRunner::from_config(&config(
        root.path(),
        "test -f package.json && mkdir node_modules",
        r#"echo '{"metadata":{"vulnerabilities":{"info":0,"low":0,"moderate":1,"high":0,"critical":1,"total":2}}}'; exit 1"#,
    ));

    let report = runner.run(JobId::new(7), &manifest()).await.unwrap();
    let counts = report.vulnerability_counts();
    assert_eq!(counts.moderate, 1);
    assert_eq!(counts.critical, 1);
    assert_eq!(counts.total(), 2);

    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_scan_sees_materialized_package_json() {
    let root = tempfile::tempdir().unwrap();
    let runner = AuditRunner::from_config(&config(
        root.path(),
        "true",
        r#"grep -q '"fixture"' package.json && echo '{"metadata":{"vulnerabilities":{}}}'"#,
    ));

    let report = runner.run(JobId::new(8), &manifest()).await.unwrap();
    assert!(report.is_safe());
}

#[tokio::test]
async fn test_failed_install_removes_workspace() {
    let root = tempfile::tempdir().unwrap();
    let runner = AuditRunner::from_config(&config(
        root.path(),
        "touch partial; echo 'npm ERR! code ETARGET' >&2; exit 1",
        "echo '{}'",
    ));

    let err = runner.run(JobId::new(9), &manifest()).await.unwrap_err();
    assert!(matches!(err, ExecutionError::InstallFailed { code: Some(1), .. }));
    assert!(err.to_string().contains("ETARGET"));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_install_timeout_is_install_failure() {
    let root = tempfile::tempdir().unwrap();
    let mut config = config(root.path(), "sleep 30", "echo '{}'");
    config.step_timeout_seconds = 1;
    let runner = AuditRunner::from_config(&config);

    let started = std::time::Instant::now();
    let err = runner.run(JobId::new(10), &manifest()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, ExecutionError::InstallFailed { code: None, .. }));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}
