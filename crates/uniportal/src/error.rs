//! CLI error types with miette diagnostics.
//!
//! Controller failures never reach this type: they are reported inside the
//! JSON envelope. These are the failures that prevent producing one.

use miette::Diagnostic;
use thiserror::Error;

use uniportal_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// The envelope reported `"status": "failed"`.
    pub const FAILED: i32 = 1;
    // 2 is clap's usage error exit.
    pub const CONFIG: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Could not load configuration from {path}")]
    #[diagnostic(
        code(uniportal::config),
        help(
            "Check the TOML syntax and the [portal] / [controllers.<id>] tables.\n\
             Point at another file with --config or UNIPORTAL_CONFIG."
        )
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    #[diagnostic(code(uniportal::io))]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(uniportal::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => exit_code::CONFIG,
            Self::Io(_) | Self::Json(_) => exit_code::FAILED,
        }
    }
}
