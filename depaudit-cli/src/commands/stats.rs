use anyhow::Result;

use crate::client::AuditClient;
use crate::commands::{print_json, report_client_error};
use crate::exit_codes;

/// Run the stats command
pub async fn run(client: &AuditClient) -> Result<i32> {
    match client.stats().await {
        Ok(stats) => {
            print_json(&stats)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(report_client_error(&e)),
    }
}
