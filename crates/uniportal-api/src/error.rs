use thiserror::Error;

/// Top-level error type for the `uniportal-api` crate.
///
/// Every failure a controller connection can hit: transport, login,
/// request pacing, payload decoding and site selection. The type is
/// `Clone` so a connection can keep an ordered history of its failures
/// while still handing each one back to the caller.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, locked account, unexpected status).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// An authenticated call was attempted before a successful login.
    #[error("Not logged in to UniFi controller")]
    NotAuthenticated,

    // ── Controller responses ────────────────────────────────────────
    /// The controller answered HTTP 429.
    #[error("Rate limited by controller -- please try again later")]
    RateLimited,

    /// The controller answered with a non-200 status.
    #[error("Failed to connect to UniFi controller (HTTP {status})")]
    ConnectionFailed { status: u16 },

    /// The body could not be decoded as JSON (or a token was malformed).
    #[error("Invalid response received: {message}")]
    InvalidResponse { message: String, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, TLS, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(String),

    /// Request exceeded its timeout ceiling.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be constructed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// `execute` was called before `set_api_url`.
    #[error("API URL not set")]
    ApiUrlNotSet,

    // ── Sites ───────────────────────────────────────────────────────
    #[error("Site '{name}' not found (available: {})", available.join(", "))]
    SiteNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("No sites found or could not fetch sites (tried: {})", endpoints_tried.join(", "))]
    NoSitesFound { endpoints_tried: Vec<String> },
}

impl Error {
    /// Returns `true` for controller-side throttling (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Returns `true` if a fresh login might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::NotAuthenticated | Self::ConnectionFailed { status: 401 }
        )
    }

    /// Returns `true` if the same call could succeed later unchanged.
    ///
    /// Nothing in this crate retries on its own; this is a hint for callers.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout { .. } | Self::Transport(_)
        )
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else {
            Self::Transport(err.to_string())
        }
    }

    pub(crate) fn malformed(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            body: body.into(),
        }
    }
}
