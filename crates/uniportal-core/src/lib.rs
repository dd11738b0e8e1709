// uniportal-core: Connection pooling and portal operations over uniportal-api.

pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod pool;
pub mod portal;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_POOL_TTL, DEFAULT_SWITCH_DELAY, PortalConfig};
pub use envelope::{Envelope, ErrorDetail, Status};
pub use error::PortalError;
pub use keys::{PoolKey, xor_decrypt, xor_encrypt};
pub use pool::{ConnectionPool, PooledConnection, SharedConnection};
pub use portal::{Portal, PortalRequest};
pub use store::{ControllerRecord, CredentialStore, FALLBACK_BASE_URL, MemoryCredentialStore, StoredCredentials};
