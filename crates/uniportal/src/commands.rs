//! Command handlers. Each one produces exactly one envelope per request.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use uniportal_api::{ControllerVariant, Endpoint};
use uniportal_config::{Config, ConfigCredentialStore};
use uniportal_core::{
    Envelope, Portal, PortalError, PortalRequest, Status, xor_decrypt, xor_encrypt,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Load configuration from `--config` or the platform default.
fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let result = match &global.config {
        Some(path) => uniportal_config::load_config_from(path),
        None => uniportal_config::load_config(),
    };
    result.map_err(|source| CliError::Config {
        path: global
            .config
            .clone()
            .unwrap_or_else(uniportal_config::config_path)
            .display()
            .to_string(),
        source,
    })
}

fn build_portal(config: &Config) -> Portal {
    let store = ConfigCredentialStore::from_config(config);
    Portal::new(Arc::new(store), config.portal.to_portal_config())
}

fn print(envelope: &Envelope, compact: bool) -> Result<(), CliError> {
    let rendered = if compact {
        serde_json::to_string(envelope)?
    } else {
        serde_json::to_string_pretty(envelope)?
    };
    println!("{rendered}");
    Ok(())
}

pub async fn dispatch(command: Command, global: &GlobalOpts) -> Result<Status, CliError> {
    let config = load(global)?;
    let portal = build_portal(&config);
    let request = PortalRequest {
        key: global.key.clone(),
        site: global.site.clone(),
    };

    debug!(command = ?command, "dispatching command");
    let envelope = match command {
        Command::Controllers => portal.fetch_controllers(),
        Command::Connect => portal.connect(&request).await,
        Command::Detect => portal.detect_system(&request).await,
        Command::Sites => portal.fetch_sites(&request).await,
        Command::Report(args) => match args.variant {
            Some(variant) => {
                portal
                    .fetch_report_as(&request, variant.into(), args.endpoint.into())
                    .await
            }
            None => portal.fetch_report(&request, args.endpoint.into()).await,
        },
        Command::Reset(args) if args.all => portal.reset_all_connections().await,
        Command::Reset(_) => portal.reset_connection(&request).await,
        Command::EncodeKey { id } => {
            Envelope::success(json!({ "key": xor_encrypt(id.trim(), &config.portal.key_secret) }))
        }
        Command::DecodeKey { key } => match xor_decrypt(&key, &config.portal.key_secret) {
            Ok(id) => Envelope::success(json!({ "id": id })),
            Err(e) => e.into(),
        },
        Command::Batch => return batch(&portal).await,
    };

    print(&envelope, global.compact)?;
    Ok(envelope.status)
}

// ── Batch mode ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum BatchOp {
    Controllers,
    Connect,
    Detect,
    Sites,
    Report,
    Reset,
    ResetAll,
}

/// One stdin line, e.g. `{"op":"sites","key":"7gs="}`.
#[derive(Debug, Deserialize)]
struct BatchLine {
    op: BatchOp,
    #[serde(flatten)]
    request: PortalRequest,
    #[serde(default)]
    endpoint: Option<Endpoint>,
    #[serde(default)]
    variant: Option<ControllerVariant>,
}

/// Answer stdin requests in order through a single shared portal.
///
/// Output is one compact envelope per line. Malformed lines get a
/// validation envelope; blank lines are skipped.
async fn batch(portal: &Portal) -> Result<Status, CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut overall = Status::Success;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope = match serde_json::from_str::<BatchLine>(&line) {
            Ok(parsed) => answer(portal, &parsed).await,
            Err(e) => PortalError::validation(format!("Malformed request: {e}")).into(),
        };
        if !envelope.is_success() {
            overall = Status::Failed;
        }
        print(&envelope, true)?;
    }
    Ok(overall)
}

async fn answer(portal: &Portal, line: &BatchLine) -> Envelope {
    let request = &line.request;
    match line.op {
        BatchOp::Controllers => portal.fetch_controllers(),
        BatchOp::Connect => portal.connect(request).await,
        BatchOp::Detect => portal.detect_system(request).await,
        BatchOp::Sites => portal.fetch_sites(request).await,
        BatchOp::Report => match (line.endpoint, line.variant) {
            (Some(endpoint), Some(variant)) => {
                portal.fetch_report_as(request, variant, endpoint).await
            }
            (Some(endpoint), None) => portal.fetch_report(request, endpoint).await,
            (None, _) => PortalError::validation("endpoint is required for report").into(),
        },
        BatchOp::Reset => portal.reset_connection(request).await,
        BatchOp::ResetAll => portal.reset_all_connections().await,
    }
}
