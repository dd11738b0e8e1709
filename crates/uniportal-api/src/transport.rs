// HTTP transport for controller connections.
//
// One `Transport` is owned per connection. It never keeps cookies on its
// own: the caller passes the rendered `Cookie` header in and reads the raw
// response headers back out, so session state stays explicit.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate and host name. Controllers almost always
    /// ship self-signed certificates, so this is the default.
    #[default]
    DangerAcceptInvalid,
}

/// What a request is for; selects its total timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Lightweight root probe used for variant detection.
    Probe,
    /// Login handshake.
    Login,
    /// Any other controller call.
    Api,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub login_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            login_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Total timeout ceiling for a request of the given kind.
    pub fn timeout_for(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Probe => self.probe_timeout,
            RequestKind::Login => self.login_timeout,
            RequestKind::Api => self.request_timeout,
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(concat!("uniportal/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub kind: RequestKind,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub cookie_header: Option<String>,
}

impl TransportRequest {
    pub fn new(kind: RequestKind, method: Method, url: Url) -> Self {
        Self {
            kind,
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            cookie_header: None,
        }
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    pub fn cookies(mut self, cookie_header: Option<String>) -> Self {
        self.cookie_header = cookie_header;
        self
    }
}

/// Status, body and raw headers of a completed request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
    pub headers: HeaderMap,
}

impl TransportResponse {
    /// Raw `Set-Cookie` header values, in the order they were received.
    pub fn set_cookie_headers(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }
}

/// Per-connection HTTP transport.
#[derive(Debug)]
pub struct Transport {
    http: reqwest::Client,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send a request and capture status, body and headers.
    ///
    /// Any I/O failure maps to [`Error::Transport`] (or [`Error::Timeout`]);
    /// HTTP status codes are left for the caller to interpret.
    pub async fn send(&self, request: TransportRequest) -> Result<TransportResponse, Error> {
        let timeout = self.config.timeout_for(request.kind);
        let timeout_secs = timeout.as_secs();

        debug!(method = %request.method, url = %request.url, kind = ?request.kind, "sending request");

        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(timeout);

        if let Some(cookies) = request.cookie_header {
            let value = HeaderValue::from_str(&cookies)
                .map_err(|e| Error::Transport(format!("invalid cookie header: {e}")))?;
            builder = builder.header(header::COOKIE, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&e, timeout_secs))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&e, timeout_secs))?;

        trace!(%status, bytes = body.len(), "response received");

        Ok(TransportResponse {
            status,
            body,
            headers,
        })
    }
}
