//! pathwise - command line access to the pathwise engine.
//!
//! Reads JSON documents, update batches and entity lists from files or stdin,
//! runs one engine operation on them and prints the resulting JSON.

mod commands;
mod config;
mod error;

use crate::commands::Status;
use crate::config::Config;
use crate::error::CliError;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for `get` when nothing is at the path.
const EXIT_MISSING: u8 = 1;
/// Exit status for every error.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => return report(&CliError::from(e)),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args, &config) {
        Ok(Status::Done) => ExitCode::SUCCESS,
        Ok(Status::Missing) => ExitCode::from(EXIT_MISSING),
        Err(e) => report(&e),
    }
}

fn run(args: &[String], config: &Config) -> Result<Status, CliError> {
    let invocation = commands::parse_args(args)?;
    let pretty = invocation.pretty.unwrap_or(config.pretty);
    tracing::debug!(command = ?invocation.command, pretty, "running command");

    let stdin = io::stdin();
    let stdout = io::stdout();
    commands::execute(
        invocation.command,
        pretty,
        &mut stdin.lock(),
        &mut stdout.lock(),
    )
}

fn report(error: &CliError) -> ExitCode {
    match error {
        CliError::Usage(message) => eprintln!("error: {}\n\n{}", message, commands::usage()),
        other => eprintln!("error: {}", other),
    }
    ExitCode::from(EXIT_ERROR)
}
