use std::sync::Arc;
use std::time::Duration;

use uniportal_api::{ClientOptions, DEFAULT_MIN_INTERVAL, SharedClock, SystemClock, TransportConfig};

/// Courtesy pause around site switches and connection creation.
pub const DEFAULT_SWITCH_DELAY: Duration = Duration::from_secs(5);

/// Age after which a pooled connection is rebuilt.
pub const DEFAULT_POOL_TTL: Duration = Duration::from_secs(300);

/// Runtime tuning for the pool and every connection it builds.
///
/// Built once at startup and handed to [`Portal`](crate::Portal) by value.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub transport: TransportConfig,
    pub min_request_interval: Duration,
    pub switch_delay: Duration,
    pub pool_ttl: Duration,
    /// Secret mixed into the controller key keystream. Empty by default.
    pub key_secret: String,
    pub clock: SharedClock,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            min_request_interval: DEFAULT_MIN_INTERVAL,
            switch_delay: DEFAULT_SWITCH_DELAY,
            pool_ttl: DEFAULT_POOL_TTL,
            key_secret: String::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl PortalConfig {
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            transport: self.transport.clone(),
            min_request_interval: self.min_request_interval,
            clock: Arc::clone(&self.clock),
        }
    }
}
