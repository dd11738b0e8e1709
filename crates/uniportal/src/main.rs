mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use uniportal_core::Status;

use crate::cli::Cli;
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    // Parse CLI arguments (clap exits with 2 on usage errors)
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only envelopes
    init_tracing(cli.global.verbose);

    let code = match run(cli).await {
        Ok(Status::Success) => exit_code::SUCCESS,
        Ok(Status::Failed) => exit_code::FAILED,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    if code != exit_code::SUCCESS {
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<Status, CliError> {
    commands::dispatch(cli.command, &cli.global).await
}
