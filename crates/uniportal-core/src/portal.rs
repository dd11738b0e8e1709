// Portal operations
//
// Coarse operations for a host application (web layer, CLI). Each one
// checks out a pooled connection, performs a single step and answers
// with an `Envelope`; nothing here returns a bare error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use uniportal_api::{ControllerVariant, DEFAULT_SITE, Endpoint};

use crate::config::PortalConfig;
use crate::envelope::Envelope;
use crate::error::PortalError;
use crate::keys::xor_encrypt;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::store::CredentialStore;

/// Caller input shared by most operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalRequest {
    /// Opaque controller key as issued by `fetch_controllers`.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

impl PortalRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            site: None,
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// The trimmed key, or a validation error when absent or blank.
    pub fn key(&self) -> Result<&str, PortalError> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PortalError::validation("Controller key is required"))
    }

    /// Requested site; `"default"` when absent or blank.
    pub fn site(&self) -> &str {
        self.site
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SITE)
    }
}

/// Entry point for host applications.
#[derive(Debug)]
pub struct Portal {
    pool: ConnectionPool,
    store: Arc<dyn CredentialStore>,
    key_secret: String,
}

impl Portal {
    pub fn new(store: Arc<dyn CredentialStore>, config: PortalConfig) -> Self {
        let key_secret = config.key_secret.clone();
        Self {
            pool: ConnectionPool::new(Arc::clone(&store), config),
            store,
            key_secret,
        }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// List configured controllers with their opaque keys. No network.
    pub fn fetch_controllers(&self) -> Envelope {
        let mut records = self.store.controllers();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        let controllers: Vec<Value> = records
            .into_iter()
            .map(|record| {
                json!({
                    "name": record.name,
                    "key": xor_encrypt(&record.id, &self.key_secret),
                })
            })
            .collect();
        debug!(count = controllers.len(), "listing controllers");
        Envelope::success(json!({ "controllers": controllers }))
    }

    /// Establish (or validate) a pooled connection.
    pub async fn connect(&self, request: &PortalRequest) -> Envelope {
        let conn = match self.checkout(request).await {
            Ok(conn) => conn,
            Err(envelope) => return envelope,
        };
        info!(site = conn.current_site(), variant = %conn.variant(), "connected");
        Envelope::success(json!({
            "connected": true,
            "system_type": conn.variant(),
        }))
    }

    /// Re-probe the controller and report its variant.
    pub async fn detect_system(&self, request: &PortalRequest) -> Envelope {
        let mut conn = match self.checkout(request).await {
            Ok(conn) => conn,
            Err(envelope) => return envelope,
        };
        let variant = conn.detect_system().await;
        Envelope::success(json!({ "system_type": variant }))
    }

    /// Names of all sites on the controller.
    pub async fn fetch_sites(&self, request: &PortalRequest) -> Envelope {
        let mut conn = match self.checkout(request).await {
            Ok(conn) => conn,
            Err(envelope) => return envelope,
        };
        match conn.load_available_sites(false).await {
            Ok(sites) => {
                let names: Vec<String> = sites.into_iter().map(|site| site.name).collect();
                Envelope::success(json!({ "sites": names }))
            }
            Err(e) => e.into(),
        }
    }

    /// Fetch a site-scoped report via the detected variant.
    pub async fn fetch_report(&self, request: &PortalRequest, endpoint: Endpoint) -> Envelope {
        self.report(request, None, endpoint).await
    }

    /// Fetch a site-scoped report via an explicit variant's routes.
    pub async fn fetch_report_as(
        &self,
        request: &PortalRequest,
        variant: ControllerVariant,
        endpoint: Endpoint,
    ) -> Envelope {
        self.report(request, Some(variant), endpoint).await
    }

    async fn report(
        &self,
        request: &PortalRequest,
        variant: Option<ControllerVariant>,
        endpoint: Endpoint,
    ) -> Envelope {
        let mut conn = match self.checkout(request).await {
            Ok(conn) => conn,
            Err(envelope) => return envelope,
        };
        let result = match variant {
            Some(variant) => conn.fetch_as(variant, endpoint).await,
            None => conn.fetch(endpoint).await,
        };
        match result {
            Ok(data) => Envelope::success(data),
            Err(e) => e.into(),
        }
    }

    /// Drop the pooled connection for the request's key.
    pub async fn reset_connection(&self, request: &PortalRequest) -> Envelope {
        let Ok(key) = request.key() else {
            return Envelope::success(json!({ "reset": false }));
        };
        let removed = self.pool.reset_connection(key).await;
        debug!(removed, "reset requested");
        Envelope::success(json!({ "reset": true }))
    }

    pub async fn reset_all_connections(&self) -> Envelope {
        self.pool.reset_all_connections().await;
        Envelope::success(json!({ "reset": true }))
    }

    /// Checked-out connection for the request, or the failure envelope.
    ///
    /// The guard stays locked until the operation finishes, so the site it
    /// was checked out for cannot change underneath the call.
    async fn checkout(&self, request: &PortalRequest) -> Result<PooledConnection, Envelope> {
        let key = request.key()?;
        let conn = self.pool.get_connection(key, request.site()).await?;
        if conn.is_error() {
            return Err(Envelope::from_connection_errors(conn.errors()));
        }
        Ok(conn)
    }
}
