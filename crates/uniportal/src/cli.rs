//! Clap derive structures for the `uniportal` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use uniportal_api::{ControllerVariant, Endpoint};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uniportal -- pooled sessions and reports for UniFi controllers
#[derive(Debug, Parser)]
#[command(
    name = "uniportal",
    version,
    about = "Query UniFi controllers through pooled, rate-limited sessions",
    long_about = "Query UniFi controllers through pooled, rate-limited sessions.\n\n\
        Every command prints a JSON envelope: {status, data?, error?, rate_limited?,\n\
        validation_error?}. Controllers are addressed by the opaque keys that\n\
        `uniportal controllers` prints.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "UNIPORTAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Opaque controller key
    #[arg(long, short = 'k', env = "UNIPORTAL_KEY", global = true, hide_env_values = true)]
    pub key: Option<String>,

    /// Site name
    #[arg(long, short = 's', env = "UNIPORTAL_SITE", global = true)]
    pub site: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print single-line JSON
    #[arg(long, global = true)]
    pub compact: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured controllers with their keys
    #[command(alias = "ls")]
    Controllers,

    /// Log in (or reuse a session) and report the controller variant
    Connect,

    /// Probe the controller and report whether it runs UniFi OS
    Detect,

    /// List the sites hosted on the controller
    Sites,

    /// Fetch a site-scoped report
    Report(ReportArgs),

    /// Drop pooled sessions
    Reset(ResetArgs),

    /// Turn a controller id into an opaque key
    EncodeKey {
        /// Controller id as configured under [controllers.<id>]
        id: String,
    },

    /// Turn an opaque key back into a controller id
    DecodeKey {
        key: String,
    },

    /// Read JSON requests from stdin, one per line, sharing one pool
    ///
    /// Example line: {"op":"report","key":"7gs=","site":"default","endpoint":"clients"}
    Batch,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Report to fetch
    #[arg(value_enum)]
    pub endpoint: ReportKind,

    /// Force the legacy or modern routes instead of the detected ones
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Drop every pooled session, not just the one for --key
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportKind {
    Dashboard,
    Clients,
    Devices,
    Settings,
    Health,
}

impl From<ReportKind> for Endpoint {
    fn from(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Dashboard => Self::Dashboard,
            ReportKind::Clients => Self::Clients,
            ReportKind::Devices => Self::Devices,
            ReportKind::Settings => Self::Settings,
            ReportKind::Health => Self::Health,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VariantArg {
    Legacy,
    Modern,
}

impl From<VariantArg> for ControllerVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Legacy => Self::Legacy,
            VariantArg::Modern => Self::Modern,
        }
    }
}
