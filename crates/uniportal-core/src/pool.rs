// Connection pool
//
// Process-wide cache of authenticated controller connections, keyed by a
// hash of the caller's opaque controller key. Each key owns a slot behind
// its own async mutex; the slot lock is held across validation, site
// switching and creation, so at most one login per key is ever in flight
// while different keys proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uniportal_api::{ControllerClient, DEFAULT_SITE};

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::keys::{PoolKey, xor_decrypt};
use crate::store::CredentialStore;

/// A pooled connection handle.
pub type SharedConnection = Arc<Mutex<ControllerClient>>;

/// A checked-out connection, locked and already on the requested site.
///
/// Hold it for the whole operation and drop it before asking the pool for
/// the same key again. `PooledConnection::mutex(&guard)` yields the shared
/// handle.
pub type PooledConnection = OwnedMutexGuard<ControllerClient>;

type Slot = Arc<Mutex<Option<PoolEntry>>>;

#[derive(Debug)]
struct PoolEntry {
    connection: SharedConnection,
    created_at: std::time::Instant,
}

#[derive(Debug)]
pub struct ConnectionPool {
    slots: DashMap<PoolKey, Slot>,
    store: Arc<dyn CredentialStore>,
    config: PortalConfig,
}

impl ConnectionPool {
    pub fn new(store: Arc<dyn CredentialStore>, config: PortalConfig) -> Self {
        Self {
            slots: DashMap::new(),
            store,
            config,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Check out a connection for `external_key` scoped to `site`.
    ///
    /// A pooled connection is reused while it is younger than the TTL,
    /// authenticated, holding cookies and free of recorded errors. If its
    /// active site differs, it is switched after the courtesy delay; a
    /// failed switch evicts it and a fresh connection is built.
    ///
    /// The connection lock is taken while the slot lock is still held, so
    /// no other caller can switch the site before the returned guard is
    /// dropped.
    ///
    /// Controller failures during creation do not surface as `Err`: they
    /// are recorded on the returned connection (check `is_error()`) and
    /// such a connection is never pooled. `Err` means the key or the
    /// stored credentials were unusable.
    pub async fn get_connection(
        &self,
        external_key: &str,
        site: &str,
    ) -> Result<PooledConnection, PortalError> {
        let controller_id = xor_decrypt(external_key, &self.config.key_secret)?;
        let site = normalize_site(site);
        let pool_key = PoolKey::derive(external_key);

        let slot = self.slot(&pool_key);
        let result = self.checkout(&slot, &pool_key, &controller_id, site).await;
        drop(slot);
        self.prune(&pool_key);
        result
    }

    async fn checkout(
        &self,
        slot: &Slot,
        pool_key: &PoolKey,
        controller_id: &str,
        site: &str,
    ) -> Result<PooledConnection, PortalError> {
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.take() {
            let mut conn = Arc::clone(&entry.connection).lock_owned().await;
            let age = self
                .config
                .clock
                .now()
                .saturating_duration_since(entry.created_at);

            if age < self.config.pool_ttl && conn.is_valid_connection() && !conn.is_error() {
                if conn.current_site() == site {
                    debug!(%pool_key, site, "reusing pooled connection");
                    *guard = Some(entry);
                    return Ok(conn);
                }

                self.config.clock.sleep(self.config.switch_delay).await;
                match conn.switch_to_site(site).await {
                    Ok(()) => {
                        debug!(%pool_key, site, "reusing pooled connection on new site");
                        *guard = Some(entry);
                        return Ok(conn);
                    }
                    Err(e) => {
                        warn!(%pool_key, site, error = %e, "site switch failed, rebuilding connection");
                        conn.release();
                    }
                }
            } else {
                debug!(%pool_key, age_secs = age.as_secs(), "evicting stale connection");
                conn.release();
            }
        }

        self.create(&mut guard, controller_id, pool_key, site).await
    }

    async fn create(
        &self,
        slot: &mut Option<PoolEntry>,
        controller_id: &str,
        pool_key: &PoolKey,
        site: &str,
    ) -> Result<PooledConnection, PortalError> {
        *slot = None;

        let credentials = self
            .store
            .credentials(controller_id)
            .ok_or_else(|| PortalError::ControllerNotFound {
                controller_id: controller_id.to_owned(),
            })?
            .resolve()?;

        self.config.clock.sleep(self.config.switch_delay).await;
        let mut client = ControllerClient::new(credentials, self.config.client_options())?;

        match client.login().await {
            Ok(()) if site != DEFAULT_SITE => {
                self.config.clock.sleep(self.config.switch_delay).await;
                if let Err(e) = client.switch_to_site(site).await {
                    debug!(%pool_key, site, error = %e, "new connection could not switch site");
                }
            }
            Ok(()) => {}
            Err(e) => debug!(%pool_key, error = %e, "new connection failed to log in"),
        }

        let healthy = !client.is_error();
        let connection = Arc::new(Mutex::new(client));
        let checked_out = Arc::clone(&connection).lock_owned().await;
        if healthy {
            info!(%pool_key, site, "pooled new connection");
            *slot = Some(PoolEntry {
                connection,
                created_at: self.config.clock.now(),
            });
        } else {
            warn!(%pool_key, "connection has errors, not pooling it");
        }
        Ok(checked_out)
    }

    /// Drop the pooled connection for `external_key`, if any.
    ///
    /// Returns whether a live entry was removed. Unknown keys are a no-op.
    pub async fn reset_connection(&self, external_key: &str) -> bool {
        let pool_key = PoolKey::derive(external_key);
        let Some(slot) = self.slots.get(&pool_key).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let entry = slot.lock().await.take();
        drop(slot);
        self.prune(&pool_key);

        match entry {
            Some(entry) => {
                entry.connection.lock().await.release();
                info!(%pool_key, "connection reset");
                true
            }
            None => false,
        }
    }

    /// Release every pooled connection and empty the pool.
    pub async fn reset_all_connections(&self) {
        let slots: Vec<Slot> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        let mut released = 0usize;
        for slot in slots {
            let entry = slot.lock().await.take();
            if let Some(entry) = entry {
                entry.connection.lock().await.release();
                released += 1;
            }
        }
        self.slots.retain(|_, slot| !is_vacant(slot));
        info!(released, "all connections reset");
    }

    /// Number of live pooled connections.
    pub async fn pooled_count(&self) -> usize {
        let slots: Vec<Slot> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    /// Number of keys with a slot, live or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, key: &PoolKey) -> Slot {
        Arc::clone(self.slots.entry(key.clone()).or_default().value())
    }

    /// Remove the slot for `key` if it is empty and nobody else holds it.
    fn prune(&self, key: &PoolKey) {
        self.slots.remove_if(key, |_, slot| is_vacant(slot));
    }
}

/// Empty and referenced only by the map. Callers clone a slot while holding
/// the map's shard lock, so the count cannot rise during this check.
fn is_vacant(slot: &Slot) -> bool {
    Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|entry| entry.is_none())
}

fn normalize_site(site: &str) -> &str {
    let site = site.trim();
    if site.is_empty() { DEFAULT_SITE } else { site }
}
