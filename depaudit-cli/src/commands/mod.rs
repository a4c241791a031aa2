//! Subcommand implementations

pub mod run;
pub mod stats;
pub mod status;

use crate::client::ClientError;
use crate::exit_codes;

/// Report a client error on stderr and pick the matching exit code
pub(crate) fn report_client_error(error: &ClientError) -> i32 {
    eprintln!("Error: {}", error);
    if error.is_network() {
        exit_codes::NETWORK_ERROR
    } else {
        exit_codes::INPUT_ERROR
    }
}

/// Print a JSON document to stdout
pub(crate) fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
