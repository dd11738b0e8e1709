// uniportal-api: Async session client for UniFi controllers (legacy and UniFi OS)

mod auth;
pub mod client;
pub mod clock;
pub mod cookies;
pub mod error;
pub mod models;
mod reports;
mod sites;
pub mod throttle;
pub mod transport;
pub mod variant;

pub use client::{ClientOptions, ConnectionState, ControllerClient, DEFAULT_SITE};
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use clock::{Clock, SharedClock, SystemClock};
pub use cookies::CookieJar;
pub use error::Error;
pub use models::{ControllerCredentials, SiteDescriptor};
pub use throttle::{DEFAULT_MIN_INTERVAL, RateLimiter};
pub use transport::{TlsMode, TransportConfig};
pub use variant::{ControllerVariant, Endpoint, EndpointSet};
