// Session authentication
//
// Probe the controller root to pick the variant, then POST credentials to
// that variant's login endpoint. The session itself is carried entirely
// by the cookies captured from the login response.

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, info};

use crate::client::{ControllerClient, base_headers};
use crate::error::Error;
use crate::transport::{RequestKind, TransportRequest};
use crate::variant::ControllerVariant;

impl ControllerClient {
    /// Probe the controller root and classify it.
    ///
    /// `200` means a UniFi OS console; any other status, or no answer at
    /// all, means a legacy controller. Never fails.
    pub async fn detect_system(&mut self) -> ControllerVariant {
        self.limiter.acquire().await;

        let variant = match self.probe().await {
            Ok(status) => ControllerVariant::from_probe_status(status),
            Err(e) => {
                debug!(error = %e, "root probe failed, assuming legacy controller");
                ControllerVariant::Legacy
            }
        };

        debug!(%variant, base_url = %self.credentials.base_url, "controller variant detected");
        self.state.variant = Some(variant);
        variant
    }

    async fn probe(&mut self) -> Result<StatusCode, Error> {
        let url = self.endpoint_url("")?;
        let request = TransportRequest::new(RequestKind::Probe, Method::HEAD, url)
            .headers(base_headers())
            .cookies(self.state.cookies.header_value());
        let response = self.transport.send(request).await?;
        self.ingest_cookies(&response);
        Ok(response.status)
    }

    /// Detect the variant and log in with the bound credentials.
    ///
    /// On failure the error is also appended to the connection's error list.
    pub async fn login(&mut self) -> Result<(), Error> {
        let result = self.authenticate().await;
        if let Err(e) = &result {
            self.record(e.clone());
        }
        result
    }

    async fn authenticate(&mut self) -> Result<(), Error> {
        self.state.is_authenticated = false;

        let variant = self.detect_system().await;
        let url = self.endpoint_url(variant.login_path())?;
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password.expose_secret(),
            "remember": false,
        });

        self.limiter.acquire().await;
        debug!(%url, "logging in");

        let request = TransportRequest::new(RequestKind::Login, Method::POST, url)
            .headers(base_headers())
            .body(Some(body.to_string()))
            .cookies(self.state.cookies.header_value());
        let response = self.transport.send(request).await?;

        match response.status {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(Error::RateLimited),
            status => {
                return Err(Error::Authentication {
                    message: format!(
                        "Failed to connect to UniFi controller (HTTP {})",
                        status.as_u16()
                    ),
                });
            }
        }

        self.ingest_cookies(&response);
        self.state.is_authenticated = true;
        self.state.created_at = Some(self.clock.now());
        self.limiter.mark();

        info!(
            username = %self.credentials.username,
            %variant,
            cookies = self.state.cookies.len(),
            "logged in to controller"
        );
        Ok(())
    }

    /// Log in unless the current session is still valid.
    pub async fn ensure_authenticated(&mut self) -> Result<(), Error> {
        if self.is_valid_connection() {
            return Ok(());
        }
        self.login().await
    }
}
