//! Configuration for uniportal.
//!
//! A TOML file (platform config dir, or an explicit path) merged with
//! `UNIPORTAL_`-prefixed environment variables. `[portal]` holds runtime
//! tuning, `[controllers.<id>]` the controllers the portal may connect to.
//! Passwords resolve through env var, system keyring, then plaintext.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use uniportal_api::{TlsMode, TransportConfig};
use uniportal_core::{ControllerRecord, CredentialStore, PortalConfig, StoredCredentials};

/// Keyring service name; entries are stored as `<controller id>/password`.
pub const KEYRING_SERVICE: &str = "uniportal";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalSettings,

    /// Controllers keyed by id. The id is what opaque keys encode.
    #[serde(default)]
    pub controllers: BTreeMap<String, ControllerProfile>,
}

/// Runtime tuning. Durations are whole seconds.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalSettings {
    pub connect_timeout: u64,
    pub request_timeout: u64,
    pub login_timeout: u64,
    pub probe_timeout: u64,

    /// Minimum spacing between requests on one connection.
    pub request_interval: u64,

    /// Courtesy pause around site switches and connection creation.
    pub switch_delay: u64,

    /// Age after which a pooled connection is rebuilt.
    pub pool_ttl: u64,

    /// Accept self-signed controller certificates.
    pub insecure: bool,

    /// PEM bundle to trust instead of the system store.
    pub ca_cert: Option<PathBuf>,

    /// Secret mixed into controller key obfuscation.
    pub key_secret: String,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            connect_timeout: 30,
            request_timeout: 60,
            login_timeout: 30,
            probe_timeout: 10,
            request_interval: 5,
            switch_delay: 5,
            pool_ttl: 300,
            insecure: true,
            ca_cert: None,
            key_secret: String::new(),
        }
    }
}

/// One controller entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControllerProfile {
    /// Display name; defaults to the id.
    pub name: Option<String>,

    /// Controller base URL (e.g. "https://192.168.1.1").
    pub url: Option<String>,

    pub username: Option<String>,

    /// Plaintext password (prefer keyring or `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "uniportal", "uniportal").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("uniportal");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` plus environment. A missing file is not an error.
///
/// Environment keys nest with `__`, e.g. `UNIPORTAL_PORTAL__POOL_TTL=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UNIPORTAL_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Reject controller URLs that do not parse and unreadable CA bundles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, profile) in &self.controllers {
            if let Some(url) = profile.url.as_deref().filter(|u| !u.trim().is_empty()) {
                url::Url::parse(url.trim()).map_err(|e| ConfigError::Validation {
                    field: format!("controllers.{id}.url"),
                    reason: format!("{e}: {url}"),
                })?;
            }
        }
        if let Some(ca) = &self.portal.ca_cert {
            if !ca.is_file() {
                return Err(ConfigError::Validation {
                    field: "portal.ca_cert".into(),
                    reason: format!("no such file: {}", ca.display()),
                });
            }
        }
        Ok(())
    }
}

// ── Translation to runtime config ───────────────────────────────────

impl PortalSettings {
    pub fn tls_mode(&self) -> TlsMode {
        match (&self.ca_cert, self.insecure) {
            (Some(ca), _) => TlsMode::CustomCa(ca.clone()),
            (None, true) => TlsMode::DangerAcceptInvalid,
            (None, false) => TlsMode::System,
        }
    }

    pub fn to_portal_config(&self) -> PortalConfig {
        PortalConfig {
            transport: TransportConfig {
                tls: self.tls_mode(),
                connect_timeout: Duration::from_secs(self.connect_timeout),
                request_timeout: Duration::from_secs(self.request_timeout),
                login_timeout: Duration::from_secs(self.login_timeout),
                probe_timeout: Duration::from_secs(self.probe_timeout),
            },
            min_request_interval: Duration::from_secs(self.request_interval),
            switch_delay: Duration::from_secs(self.switch_delay),
            pool_ttl: Duration::from_secs(self.pool_ttl),
            key_secret: self.key_secret.clone(),
            ..PortalConfig::default()
        }
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a controller password: `password_env`, then keyring, then plaintext.
pub fn resolve_password(profile: &ControllerProfile, controller_id: &str) -> Option<SecretString> {
    // 1. Named env var
    if let Some(value) = profile
        .password_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    let from_keyring = keyring::Entry::new(KEYRING_SERVICE, &format!("{controller_id}/password"))
        .and_then(|entry| entry.get_password());
    if let Ok(password) = from_keyring {
        return Some(SecretString::from(password));
    }

    // 3. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// `CredentialStore` backed by the `[controllers]` table.
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialStore {
    controllers: BTreeMap<String, ControllerProfile>,
}

impl ConfigCredentialStore {
    pub fn from_config(config: &Config) -> Self {
        Self {
            controllers: config.controllers.clone(),
        }
    }
}

impl CredentialStore for ConfigCredentialStore {
    fn controllers(&self) -> Vec<ControllerRecord> {
        self.controllers
            .iter()
            .map(|(id, profile)| ControllerRecord {
                id: id.clone(),
                name: profile.name.clone().unwrap_or_else(|| id.clone()),
            })
            .collect()
    }

    fn credentials(&self, id: &str) -> Option<StoredCredentials> {
        let profile = self.controllers.get(id)?;
        Some(StoredCredentials {
            username: profile.username.clone(),
            password: resolve_password(profile, id),
            base_url: profile.url.clone(),
        })
    }
}
