//! Run Command - Submit a manifest and wait for the audit report

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Map, Value, json};

use crate::Cli;
use crate::client::{AuditClient, PollOutcome};
use crate::commands::{print_json, report_client_error};
use crate::exit_codes;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Project directory containing package.json
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Maximum number of polls before giving up
    #[arg(long, default_value_t = 60)]
    pub attempts: u32,

    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

/// Build the submission body from a project's package.json
pub async fn build_submission(project: &Path) -> Result<Value> {
    let manifest_path = project.join("package.json");
    let raw = tokio::fs::read_to_string(&manifest_path)
        .await
        .with_context(|| format!("Cannot read {}", manifest_path.display()))?;
    let package_json: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", manifest_path.display()))?;

    let dependencies = package_json
        .get("dependencies")
        .filter(|d| !d.is_null())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    Ok(json!({
        "package_json": package_json,
        "dependencies": dependencies,
    }))
}

/// Run the run command
pub async fn run(client: &AuditClient, cli: &Cli, args: &RunArgs) -> Result<i32> {
    let submission = match build_submission(&args.path).await {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(exit_codes::INPUT_ERROR);
        }
    };

    let job_id = match client.submit(&submission).await {
        Ok(id) => id,
        Err(e) => return Ok(report_client_error(&e)),
    };
    cli.progress(&format!(
        "Submitted job {} to {}; polling every {}s",
        job_id,
        client.base_url(),
        args.interval
    ));

    let outcome = client
        .poll(&job_id, args.attempts, Duration::from_secs(args.interval))
        .await;

    match outcome {
        Ok(PollOutcome::Completed(report)) => {
            print_json(&report)?;
            Ok(exit_codes::SUCCESS)
        }
        Ok(PollOutcome::Failed(reason)) => {
            eprintln!("Audit of job {} failed: {}", job_id, reason);
            Ok(exit_codes::AUDIT_FAILED)
        }
        Ok(PollOutcome::Exhausted) => {
            eprintln!(
                "Report not yet available for job {} after {} attempts; check later with `depaudit status {}`",
                job_id, args.attempts, job_id
            );
            Ok(exit_codes::NOT_READY)
        }
        Err(e) => Ok(report_client_error(&e)),
    }
}
