// Controller-facing data types
//
// Credentials bound to a connection and the site descriptors parsed from
// the controller's site-listing endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

const UNKNOWN: &str = "Unknown";

/// Login material for one controller. Immutable once bound to a client.
#[derive(Debug, Clone)]
pub struct ControllerCredentials {
    pub username: String,
    pub password: SecretString,
    pub base_url: Url,
}

impl ControllerCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, base_url: Url) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            base_url,
        }
    }
}

/// A site hosted on a controller.
///
/// `name` is the machine key used in site-scoped URLs, `desc` the display
/// label shown in the controller UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub name: String,
    pub desc: String,
    pub role: String,
}

/// Site record as the controller sends it. Every field is optional.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSite {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl From<RawSite> for SiteDescriptor {
    fn from(raw: RawSite) -> Self {
        let name = raw
            .name
            .clone()
            .or_else(|| raw.desc.clone())
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let desc = raw
            .desc
            .or(raw.name)
            .unwrap_or_else(|| UNKNOWN.to_owned());
        let role = raw.role.unwrap_or_else(|| UNKNOWN.to_owned());
        Self { name, desc, role }
    }
}

/// Either the legacy `{ "data": [...] }` envelope or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SitesPayload {
    Envelope { data: Vec<RawSite> },
    Bare(Vec<RawSite>),
}

impl SitesPayload {
    /// Parse a decoded body; anything that is not a site list yields `None`.
    pub(crate) fn parse(value: &serde_json::Value) -> Option<Vec<SiteDescriptor>> {
        let payload = Self::deserialize(value).ok()?;
        let raw = match payload {
            Self::Envelope { data } | Self::Bare(data) => data,
        };
        Some(raw.into_iter().map(SiteDescriptor::from).collect())
    }
}
