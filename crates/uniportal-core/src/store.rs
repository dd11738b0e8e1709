// Credential store contract
//
// Controller credentials live outside this crate. The pool only needs two
// things from a store: the list of known controllers, and the stored
// login fields for one id (any of which may be absent).

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use uniportal_api::ControllerCredentials;
use url::Url;

use crate::error::PortalError;

/// Controller URL assumed when none is stored.
pub const FALLBACK_BASE_URL: &str = "https://127.0.0.1:8443";

/// A configured controller, as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerRecord {
    pub id: String,
    pub name: String,
}

/// Raw stored login fields for one controller.
#[derive(Debug, Clone, Default)]
pub struct StoredCredentials {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub base_url: Option<String>,
}

impl StoredCredentials {
    /// Validate the stored fields into usable credentials.
    ///
    /// Username and password are required; an absent URL falls back to
    /// [`FALLBACK_BASE_URL`].
    pub fn resolve(self) -> Result<ControllerCredentials, PortalError> {
        let username = self.username.filter(|u| !u.trim().is_empty());
        let password = self.password.filter(|p| !p.expose_secret().is_empty());

        let mut missing = Vec::new();
        if username.is_none() {
            missing.push("user");
        }
        if password.is_none() {
            missing.push("password");
        }
        let (Some(username), Some(password)) = (username, password) else {
            return Err(PortalError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        let raw_url = self
            .base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_BASE_URL.to_owned());
        let base_url = Url::parse(raw_url.trim())
            .map_err(|e| PortalError::validation(format!("Invalid controller URL '{raw_url}': {e}")))?;

        Ok(ControllerCredentials {
            username,
            password,
            base_url,
        })
    }
}

/// Lookup of controller credentials by id.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    fn controllers(&self) -> Vec<ControllerRecord>;

    /// `None` when no controller with this id exists.
    fn credentials(&self, id: &str) -> Option<StoredCredentials>;
}

/// In-process store, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: BTreeMap<String, (String, StoredCredentials)>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>, credentials: StoredCredentials) {
        self.entries.insert(id.into(), (name.into(), credentials));
    }

    /// Builder-style [`insert`](Self::insert) with all three fields present.
    pub fn with_controller(mut self, id: &str, name: &str, username: &str, password: &str, base_url: &str) -> Self {
        self.insert(
            id,
            name,
            StoredCredentials {
                username: Some(username.to_owned()),
                password: Some(SecretString::from(password.to_owned())),
                base_url: Some(base_url.to_owned()),
            },
        );
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn controllers(&self) -> Vec<ControllerRecord> {
        self.entries
            .iter()
            .map(|(id, (name, _))| ControllerRecord {
                id: id.clone(),
                name: name.clone(),
            })
            .collect()
    }

    fn credentials(&self, id: &str) -> Option<StoredCredentials> {
        self.entries.get(id).map(|(_, creds)| creds.clone())
    }
}
