//! depaudit CLI - Submit a project's manifest and poll for its audit report
//!
//! The server does the auditing; this client only reads `package.json`,
//! submits it, and polls `GET /api/job/{id}` on a fixed interval.

pub mod client;
pub mod commands;

pub use client::{AuditClient, ClientError, PollOutcome};

use clap::{Parser, Subcommand};

/// depaudit - Dependency audits from the command line
#[derive(Parser, Debug)]
#[command(
    name = "depaudit",
    version,
    about = "Submit dependency manifests to a depaudit server and fetch audit reports",
    long_about = "depaudit submits a project's package.json to a depaudit server, which \
                  installs the dependencies in a sandbox and runs a security audit. The CLI \
                  polls until the report is ready and prints it as JSON."
)]
pub struct Cli {
    /// Base URL of the depaudit server
    #[arg(
        long,
        global = true,
        env = "DEPAUDIT_SERVER_URL",
        default_value = "http://localhost:3000"
    )]
    pub server: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress messages; only the JSON result is printed
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a project's package.json and wait for its report
    #[command(visible_alias = "r")]
    Run(commands::run::RunArgs),

    /// Show the state of a submitted job
    Status(commands::status::StatusArgs),

    /// Show aggregate statistics across completed audits
    Stats,
}

impl Cli {
    /// Dispatch to the selected subcommand, returning the process exit code
    pub async fn run(&self) -> anyhow::Result<i32> {
        let client = AuditClient::new(&self.server)?;
        match &self.command {
            Commands::Run(args) => commands::run::run(&client, self, args).await,
            Commands::Status(args) => commands::status::run(&client, args).await,
            Commands::Stats => commands::stats::run(&client).await,
        }
    }

    /// Print a progress line to stderr unless `--quiet`
    pub fn progress(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }
}

/// Exit codes for CI integration
pub mod exit_codes {
    /// Report retrieved
    pub const SUCCESS: i32 = 0;
    /// Bad input: missing manifest, rejected submission, unknown job
    pub const INPUT_ERROR: i32 = 1;
    /// The audit failed permanently on the server
    pub const AUDIT_FAILED: i32 = 2;
    /// Polling budget exhausted before the report was available
    pub const NOT_READY: i32 = 3;
    /// Server unreachable or unavailable
    pub const NETWORK_ERROR: i32 = 4;
}
