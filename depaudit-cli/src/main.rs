//! depaudit CLI entry point

use clap::Parser;

use depaudit_cli::Cli;
use depaudit_core::config::LoggingConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: if cli.verbose { "debug" } else { "warn" }.to_string(),
        format: "compact".to_string(),
    };
    if let Err(e) = depaudit_core::init_tracing(&logging) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let code = match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            depaudit_cli::exit_codes::INPUT_ERROR
        }
    };
    std::process::exit(code);
}
