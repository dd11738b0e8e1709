// Controller connection
//
// One `ControllerClient` owns everything about a single controller session:
// its transport, pacing, cookie jar, detected variant, active site and the
// ordered list of failures it has hit. Login, site and report operations
// live in sibling modules as further `impl ControllerClient` blocks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::clock::{SharedClock, SystemClock};
use crate::cookies::CookieJar;
use crate::error::Error;
use crate::models::{ControllerCredentials, SiteDescriptor};
use crate::throttle::{DEFAULT_MIN_INTERVAL, RateLimiter};
use crate::transport::{RequestKind, Transport, TransportConfig, TransportRequest, TransportResponse};
use crate::variant::ControllerVariant;

/// Site every controller has; also the sentinel for "no explicit site".
pub const DEFAULT_SITE: &str = "default";

const CSRF_HEADER: &str = "x-csrf-token";

/// Knobs for building a [`ControllerClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub transport: TransportConfig,
    /// Minimum spacing between two requests on the connection.
    pub min_request_interval: Duration,
    pub clock: SharedClock,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            min_request_interval: DEFAULT_MIN_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Mutable session state of one controller connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub is_authenticated: bool,
    /// `None` until the controller root has been probed.
    pub variant: Option<ControllerVariant>,
    pub cookies: CookieJar,
    pub created_at: Option<Instant>,
    pub current_site: String,
    /// Append-only; cleared only by building a new client.
    pub errors: Vec<Error>,
}

/// An authenticated (or authenticating) session against one controller.
///
/// Not `Clone`: a connection is owned by exactly one caller at a time. The
/// connection pool hands it out behind a mutex.
#[derive(Debug)]
pub struct ControllerClient {
    pub(crate) credentials: ControllerCredentials,
    pub(crate) transport: Transport,
    pub(crate) limiter: RateLimiter,
    pub(crate) clock: SharedClock,
    pub(crate) state: ConnectionState,
    pub(crate) sites: Option<Vec<SiteDescriptor>>,
    api_url: Option<Url>,
    last_response: Option<Value>,
}

impl ControllerClient {
    pub fn new(credentials: ControllerCredentials, options: ClientOptions) -> Result<Self, Error> {
        let transport = Transport::new(options.transport)?;
        let limiter = RateLimiter::new(options.min_request_interval, Arc::clone(&options.clock));
        Ok(Self {
            credentials,
            transport,
            limiter,
            clock: options.clock,
            state: ConnectionState {
                current_site: DEFAULT_SITE.to_owned(),
                ..ConnectionState::default()
            },
            sites: None,
            api_url: None,
            last_response: None,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn credentials(&self) -> &ControllerCredentials {
        &self.credentials
    }

    pub fn base_url(&self) -> &Url {
        &self.credentials.base_url
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.state.cookies
    }

    /// Variant used for dispatch. Modern until a probe says otherwise.
    pub fn variant(&self) -> ControllerVariant {
        self.state.variant.unwrap_or_default()
    }

    pub fn detected_variant(&self) -> Option<ControllerVariant> {
        self.state.variant
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    pub fn current_site(&self) -> &str {
        &self.state.current_site
    }

    /// Set the active site without consulting the controller.
    pub fn set_site(&mut self, name: &str) {
        let name = name.trim();
        self.state.current_site = if name.is_empty() {
            DEFAULT_SITE.to_owned()
        } else {
            name.to_owned()
        };
    }

    pub fn created_at(&self) -> Option<Instant> {
        self.state.created_at
    }

    pub fn last_request_at(&self) -> Option<Instant> {
        self.limiter.last_request_at()
    }

    /// Decoded body of the most recent successful API call.
    pub fn last_response(&self) -> Option<&Value> {
        self.last_response.as_ref()
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Authenticated and holding at least one session cookie.
    pub fn is_valid_connection(&self) -> bool {
        self.state.is_authenticated && !self.state.cookies.is_empty()
    }

    pub fn is_error(&self) -> bool {
        !self.state.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.state.errors
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.state.errors.iter().map(ToString::to_string).collect()
    }

    // ── URL handling ─────────────────────────────────────────────────

    /// `base_url` joined with `path`, with exactly one slash between them.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.credentials.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Set the target of the next [`execute`](Self::execute) call.
    pub fn set_api_url(&mut self, path: &str) -> Result<(), Error> {
        self.api_url = Some(self.endpoint_url(path)?);
        Ok(())
    }

    pub fn api_url(&self) -> Option<&Url> {
        self.api_url.as_ref()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Issue one authenticated call against the URL set by `set_api_url`.
    ///
    /// Failures are appended to the connection's error list and returned.
    pub async fn execute(&mut self, method: Method, payload: Option<&Value>) -> Result<Value, Error> {
        let result = self.run(method, payload).await;
        if let Err(e) = &result {
            self.record(e.clone());
        }
        result
    }

    async fn run(&mut self, method: Method, payload: Option<&Value>) -> Result<Value, Error> {
        if !self.state.is_authenticated {
            return Err(Error::NotAuthenticated);
        }
        let url = self.api_url.clone().ok_or(Error::ApiUrlNotSet)?;
        self.send_api(method, url, payload).await
    }

    /// Paced, authenticated request that does not touch the error list.
    pub(crate) async fn send_api(
        &mut self,
        method: Method,
        url: Url,
        payload: Option<&Value>,
    ) -> Result<Value, Error> {
        self.limiter.acquire().await;

        let request = TransportRequest::new(RequestKind::Api, method, url)
            .headers(self.auth_headers()?)
            .body(payload.map(ToString::to_string))
            .cookies(self.state.cookies.header_value());
        let response = self.transport.send(request).await?;
        self.ingest_cookies(&response);

        match response.status {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(Error::RateLimited),
            StatusCode::UNAUTHORIZED => {
                debug!("session rejected by controller");
                self.state.is_authenticated = false;
                return Err(Error::ConnectionFailed { status: 401 });
            }
            status => return Err(Error::ConnectionFailed { status: status.as_u16() }),
        }

        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| Error::malformed(e.to_string(), response.body.as_str()))?;
        self.last_response = Some(value.clone());
        Ok(value)
    }

    pub(crate) fn record(&mut self, error: Error) {
        warn!(error = %error, site = %self.state.current_site, "controller connection error");
        self.state.errors.push(error);
    }

    pub(crate) fn ingest_cookies(&mut self, response: &TransportResponse) {
        self.state.cookies = self
            .state
            .cookies
            .ingest_set_cookie_headers(response.set_cookie_headers());
    }

    /// Base headers plus `x-csrf-token` on modern controllers.
    fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = base_headers();
        if self.variant().is_modern() {
            if let Some(token) = self.state.cookies.csrf_token()? {
                let value = HeaderValue::from_str(&token)
                    .map_err(|_| Error::malformed("CSRF token is not a valid header value", token.as_str()))?;
                headers.insert(HeaderName::from_static(CSRF_HEADER), value);
            }
        }
        Ok(headers)
    }

    /// Drop the session: cookies, auth flag, site cache and target URL.
    ///
    /// The recorded error list survives; only a new client clears it.
    pub fn release(&mut self) {
        debug!(base_url = %self.credentials.base_url, "releasing controller session");
        self.state.is_authenticated = false;
        self.state.cookies = CookieJar::new();
        self.sites = None;
        self.api_url = None;
    }
}

pub(crate) fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ControllerClient {
        let credentials = ControllerCredentials::new("admin", "secret", Url::parse(base).unwrap());
        ControllerClient::new(credentials, ClientOptions::default()).unwrap()
    }

    #[test]
    fn endpoint_urls_join_with_one_slash() {
        let c = client("https://controller:8443/");
        assert_eq!(
            c.endpoint_url("/api/self/sites").unwrap().as_str(),
            "https://controller:8443/api/self/sites"
        );
        assert_eq!(
            c.endpoint_url("api/login").unwrap().as_str(),
            "https://controller:8443/api/login"
        );
    }

    #[test]
    fn fresh_client_is_not_valid() {
        let c = client("https://controller:8443");
        assert!(!c.is_valid_connection());
        assert!(!c.is_error());
        assert_eq!(c.current_site(), DEFAULT_SITE);
        assert_eq!(c.detected_variant(), None);
        assert_eq!(c.variant(), ControllerVariant::Modern);
    }

    #[test]
    fn empty_site_name_means_default() {
        let mut c = client("https://controller:8443");
        c.set_site("guest");
        assert_eq!(c.current_site(), "guest");
        c.set_site("  ");
        assert_eq!(c.current_site(), DEFAULT_SITE);
    }

    #[tokio::test]
    async fn execute_requires_login_and_target() {
        let mut c = client("https://controller:8443");
        let err = c.execute(Method::GET, None).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));

        c.state.is_authenticated = true;
        let err = c.execute(Method::GET, None).await.unwrap_err();
        assert!(matches!(err, Error::ApiUrlNotSet));

        assert_eq!(c.errors().len(), 2);
        assert_eq!(
            c.error_messages(),
            vec!["Not logged in to UniFi controller", "API URL not set"]
        );
    }

    #[test]
    fn release_keeps_error_history() {
        let mut c = client("https://controller:8443");
        c.state.is_authenticated = true;
        c.state.cookies = CookieJar::new().ingest_set_cookie_headers(["unifises=abc"]);
        c.record(Error::RateLimited);
        assert!(c.is_valid_connection());

        c.release();

        assert!(!c.is_valid_connection());
        assert!(c.cookies().is_empty());
        assert!(c.is_error());
    }
}
