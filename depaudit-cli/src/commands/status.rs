//! Status Command - Show one job without waiting

use anyhow::Result;
use clap::Args;

use crate::client::AuditClient;
use crate::commands::{print_json, report_client_error};
use crate::exit_codes;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job id returned by `depaudit run` or `POST /api/submit`
    pub job_id: String,
}

/// Run the status command
pub async fn run(client: &AuditClient, args: &StatusArgs) -> Result<i32> {
    match client.job(&args.job_id).await {
        Ok(Some(body)) => {
            print_json(&body)?;
            Ok(match body["job"]["state"].as_str() {
                Some("completed") => exit_codes::SUCCESS,
                Some("failed") => exit_codes::AUDIT_FAILED,
                _ => exit_codes::NOT_READY,
            })
        }
        Ok(None) => {
            eprintln!("Job {} not found", args.job_id);
            Ok(exit_codes::INPUT_ERROR)
        }
        Err(e) => Ok(report_client_error(&e)),
    }
}
