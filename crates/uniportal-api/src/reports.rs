// Site-scoped report fetchers
//
// Thin wrappers over `execute`: pick the variant's endpoint template, scope
// it to the active site and GET it.

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::client::ControllerClient;
use crate::error::Error;
use crate::variant::{ControllerVariant, Endpoint};

impl ControllerClient {
    /// Fetch `endpoint` using the detected variant's routing table.
    pub async fn fetch(&mut self, endpoint: Endpoint) -> Result<Value, Error> {
        let variant = self.variant();
        self.fetch_as(variant, endpoint).await
    }

    /// Fetch `endpoint` through an explicitly chosen routing table.
    pub async fn fetch_as(
        &mut self,
        variant: ControllerVariant,
        endpoint: Endpoint,
    ) -> Result<Value, Error> {
        let path = variant.endpoints().path(endpoint, &self.state.current_site);
        if let Err(e) = self.set_api_url(&path) {
            self.record(e.clone());
            return Err(e);
        }
        debug!(%endpoint, %variant, path, "fetching report");
        self.execute(Method::GET, None).await
    }

    pub async fn dashboard(&mut self) -> Result<Value, Error> {
        self.fetch(Endpoint::Dashboard).await
    }

    pub async fn clients(&mut self) -> Result<Value, Error> {
        self.fetch(Endpoint::Clients).await
    }

    pub async fn devices(&mut self) -> Result<Value, Error> {
        self.fetch(Endpoint::Devices).await
    }

    pub async fn settings(&mut self) -> Result<Value, Error> {
        self.fetch(Endpoint::Settings).await
    }

    pub async fn health(&mut self) -> Result<Value, Error> {
        self.fetch(Endpoint::Health).await
    }
}
