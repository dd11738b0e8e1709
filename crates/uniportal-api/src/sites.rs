// Site enumeration and switching
//
// Site listing is controller-scoped. Modern consoles have moved the
// endpoint once, so every candidate path is tried in order.

use reqwest::Method;
use tracing::{debug, info};

use crate::client::{ControllerClient, DEFAULT_SITE};
use crate::error::Error;
use crate::models::{SiteDescriptor, SitesPayload};

impl ControllerClient {
    /// List the sites on this controller, from cache unless `force` is set.
    ///
    /// The first candidate endpoint returning a non-empty list wins.
    /// Failing candidates are not recorded individually; only the final
    /// [`Error::NoSitesFound`] is. A 429 aborts the search immediately.
    pub async fn load_available_sites(&mut self, force: bool) -> Result<Vec<SiteDescriptor>, Error> {
        if let (Some(sites), false) = (&self.sites, force) {
            return Ok(sites.clone());
        }
        self.sites = None;
        self.ensure_authenticated().await?;

        let mut endpoints_tried = Vec::new();
        for path in self.variant().sites_paths() {
            endpoints_tried.push((*path).to_owned());
            let url = match self.endpoint_url(path) {
                Ok(url) => url,
                Err(e) => {
                    debug!(path, error = %e, "skipping unusable sites endpoint");
                    continue;
                }
            };

            match self.send_api(Method::GET, url, None).await {
                Ok(body) => match SitesPayload::parse(&body) {
                    Some(sites) if !sites.is_empty() => {
                        debug!(path, count = sites.len(), "sites loaded");
                        self.sites = Some(sites.clone());
                        return Ok(sites);
                    }
                    _ => debug!(path, "sites endpoint returned no sites"),
                },
                Err(Error::RateLimited) => {
                    self.record(Error::RateLimited);
                    return Err(Error::RateLimited);
                }
                Err(e) => debug!(path, error = %e, "sites endpoint failed"),
            }
        }

        let err = Error::NoSitesFound { endpoints_tried };
        self.record(err.clone());
        Err(err)
    }

    /// Sites from the last successful load, if any.
    pub fn cached_sites(&self) -> Option<&[SiteDescriptor]> {
        self.sites.as_deref()
    }

    pub fn site_names(&self) -> Vec<String> {
        self.sites
            .iter()
            .flatten()
            .map(|site| site.name.clone())
            .collect()
    }

    pub fn site_count(&self) -> usize {
        self.sites.as_ref().map_or(0, Vec::len)
    }

    pub fn has_multiple_sites(&self) -> bool {
        self.site_count() > 1
    }

    /// Make `name` the active site.
    ///
    /// A controller with a single site accepts `"default"` as-is. An
    /// unknown name fails with [`Error::SiteNotFound`], leaves the active
    /// site untouched and drops the site cache. Switching is a metadata
    /// update; it only logs in again if the session was lost.
    pub async fn switch_to_site(&mut self, name: &str) -> Result<(), Error> {
        let sites = self.load_available_sites(false).await?;

        if sites.len() == 1 && name == DEFAULT_SITE {
            self.set_site(DEFAULT_SITE);
            return Ok(());
        }

        if !sites.iter().any(|site| site.name == name) {
            let err = Error::SiteNotFound {
                name: name.to_owned(),
                available: sites.into_iter().map(|site| site.name).collect(),
            };
            self.sites = None;
            self.record(err.clone());
            return Err(err);
        }

        self.ensure_authenticated().await?;
        self.set_site(name);
        info!(site = name, "switched site");
        Ok(())
    }
}
