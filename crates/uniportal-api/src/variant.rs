use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Which login/API endpoint shape a controller speaks.
///
/// Determined by probing the controller root: UniFi OS consoles answer
/// `200`, standalone Network Applications redirect or refuse.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ControllerVariant {
    /// Standalone (Java) Network Application.
    Legacy,
    /// UniFi OS console (UDM, UCG, Cloud Key Gen2+) behind `/proxy/network`.
    #[default]
    Modern,
}

impl ControllerVariant {
    /// Classify a controller from the status of its root probe.
    pub fn from_probe_status(status: StatusCode) -> Self {
        if status == StatusCode::OK {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    pub fn is_modern(self) -> bool {
        self == Self::Modern
    }

    /// The login endpoint path.
    pub fn login_path(self) -> &'static str {
        match self {
            Self::Modern => "/api/auth/login",
            Self::Legacy => "/api/login",
        }
    }

    /// Site-listing endpoints, in the order they should be tried.
    pub fn sites_paths(self) -> &'static [&'static str] {
        match self {
            Self::Modern => &["/proxy/network/api/self/sites", "/api/sites"],
            Self::Legacy => &["/api/self/sites"],
        }
    }

    /// Report endpoint table for this variant.
    pub fn endpoints(self) -> &'static EndpointSet {
        match self {
            Self::Modern => &MODERN_ENDPOINTS,
            Self::Legacy => &LEGACY_ENDPOINTS,
        }
    }
}

/// Logical report operations available on both variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Endpoint {
    Dashboard,
    Clients,
    Devices,
    Settings,
    Health,
}

/// Path templates for one variant. `{site}` is replaced at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSet {
    pub dashboard: &'static str,
    pub clients: &'static str,
    pub devices: &'static str,
    pub settings: &'static str,
    pub health: &'static str,
}

pub const LEGACY_ENDPOINTS: EndpointSet = EndpointSet {
    dashboard: "/api/s/{site}/stat/dashboard",
    clients: "/api/s/{site}/stat/sta",
    devices: "/api/s/{site}/stat/device",
    settings: "/api/s/{site}/get/setting",
    health: "/api/s/{site}/stat/health",
};

pub const MODERN_ENDPOINTS: EndpointSet = EndpointSet {
    dashboard: "/proxy/network/v2/api/site/{site}/aggregated-dashboard",
    clients: "/proxy/network/v2/api/site/{site}/clients/active",
    devices: "/proxy/network/v2/api/site/{site}/device",
    settings: "/proxy/network/api/s/{site}/get/setting",
    health: "/proxy/network/v2/api/site/{site}/health",
};

impl EndpointSet {
    pub fn template(&self, endpoint: Endpoint) -> &'static str {
        match endpoint {
            Endpoint::Dashboard => self.dashboard,
            Endpoint::Clients => self.clients,
            Endpoint::Devices => self.devices,
            Endpoint::Settings => self.settings,
            Endpoint::Health => self.health,
        }
    }

    /// Concrete path for `endpoint` scoped to `site`.
    pub fn path(&self, endpoint: Endpoint, site: &str) -> String {
        self.template(endpoint).replace("{site}", site)
    }
}
