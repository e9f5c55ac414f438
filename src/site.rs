//! Observatory sites and the lookup service that provides them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::coords::EarthLocation;
use crate::error::{Error, Result};

/// Observatory location and identifying metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// `None` for the sentinel site returned when an image cannot be placed
    pub siteid: Option<i64>,
    #[serde(default)]
    pub sitename: String,
    /// Short code some instruments write into their headers (e.g. `SITE`)
    #[serde(default)]
    pub site_keyword: String,
    #[serde(default)]
    pub location: Option<EarthLocation>,
}

impl Site {
    /// Sentinel for "no known site".
    pub fn none() -> Self {
        Self {
            siteid: None,
            sitename: String::new(),
            site_keyword: String::new(),
            location: None,
        }
    }
}

/// Source of site metadata. Calls are synchronous and not retried; a failure
/// aborts the load that needed it.
pub trait SiteLookup {
    fn get_site(&self, siteid: i64) -> Result<Site>;

    fn get_all_sites(&self) -> Result<Vec<Site>>;
}

impl<T: SiteLookup + ?Sized> SiteLookup for &T {
    fn get_site(&self, siteid: i64) -> Result<Site> {
        (**self).get_site(siteid)
    }

    fn get_all_sites(&self) -> Result<Vec<Site>> {
        (**self).get_all_sites()
    }
}

/// In-memory site table, typically loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteCatalog {
    sites: Vec<Site>,
}

impl SiteCatalog {
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// Load a JSON array of site records.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::SiteLookup(format!("site catalog: {e}")))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl SiteLookup for SiteCatalog {
    fn get_site(&self, siteid: i64) -> Result<Site> {
        self.sites
            .iter()
            .find(|s| s.siteid == Some(siteid))
            .cloned()
            .ok_or(Error::SiteNotFound(siteid))
    }

    fn get_all_sites(&self) -> Result<Vec<Site>> {
        Ok(self.sites.clone())
    }
}
