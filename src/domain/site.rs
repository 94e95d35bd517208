use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum SiteError {
    #[error("unknown site \"{0}\"")]
    UnknownSite(String),
    #[error("site \"{0}\" has no url configured")]
    MissingUrl(String),
    #[error("invalid url \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// How an element is found on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    LinkText(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn link_text(text: &str) -> Self {
        Locator::LinkText(text.to_string())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{}`", s),
            Locator::LinkText(s) => write!(f, "link text `{}`", s),
        }
    }
}

/// Fixed pauses, in seconds, inserted between browsing steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub after_load_secs: u64,
    pub after_scroll_secs: u64,
    pub after_tab_open_secs: u64,
    pub after_tab_close_secs: u64,
    pub between_listings_secs: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            after_load_secs: 3,
            after_scroll_secs: 1,
            after_tab_open_secs: 2,
            after_tab_close_secs: 2,
            between_listings_secs: 1,
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Pacing {
            after_load_secs: 0,
            after_scroll_secs: 0,
            after_tab_open_secs: 0,
            after_tab_close_secs: 0,
            between_listings_secs: 0,
        }
    }

    pub fn after_load(&self) -> Duration {
        Duration::from_secs(self.after_load_secs)
    }

    pub fn after_scroll(&self) -> Duration {
        Duration::from_secs(self.after_scroll_secs)
    }

    pub fn after_tab_open(&self) -> Duration {
        Duration::from_secs(self.after_tab_open_secs)
    }

    pub fn after_tab_close(&self) -> Duration {
        Duration::from_secs(self.after_tab_close_secs)
    }

    pub fn between_listings(&self) -> Duration {
        Duration::from_secs(self.between_listings_secs)
    }
}

/// Selectors and interaction steps for one site family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterSpec {
    StaticCard {
        listings: String,
    },
    DrillDown {
        listings: String,
        detail_link: Locator,
        detail_region: String,
        wait_secs: u64,
    },
    DisclosureModal {
        listings: String,
        trigger: String,
        modal: String,
        dismiss: String,
        wait_secs: u64,
    },
    FullPage,
}

impl AdapterSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterSpec::StaticCard { .. } => "static_card",
            AdapterSpec::DrillDown { .. } => "drill_down",
            AdapterSpec::DisclosureModal { .. } => "disclosure_modal",
            AdapterSpec::FullPage => "full_page",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    pub url: String,
    #[serde(default)]
    pub fields: Vec<String>,
    pub adapter: AdapterSpec,
    #[serde(default)]
    pub pacing: Pacing,
}

/// A site entry whose url has been checked.
#[derive(Debug, Clone)]
pub struct ResolvedSite {
    pub key: String,
    pub url: Url,
    pub default_fields: Vec<String>,
    pub adapter: AdapterSpec,
    pub pacing: Pacing,
}

impl ResolvedSite {
    /// An operator-supplied page that matches no known family.
    pub fn custom(url: &str) -> Result<Self, SiteError> {
        Ok(ResolvedSite {
            key: "custom".to_string(),
            url: parse_url(url)?,
            default_fields: vec![],
            adapter: AdapterSpec::FullPage,
            pacing: Pacing::default(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<String, SiteEntry>,
}

impl SiteRegistry {
    pub fn new(sites: BTreeMap<String, SiteEntry>) -> Self {
        SiteRegistry { sites }
    }

    pub fn list(&self) -> impl Iterator<Item = (&String, &SiteEntry)> {
        self.sites.iter()
    }

    pub fn resolve(&self, key: &str) -> Result<ResolvedSite, SiteError> {
        let entry = self
            .sites
            .get(key)
            .ok_or_else(|| SiteError::UnknownSite(key.to_string()))?;

        if entry.url.trim().is_empty() {
            return Err(SiteError::MissingUrl(key.to_string()));
        }

        Ok(ResolvedSite {
            key: key.to_string(),
            url: parse_url(&entry.url)?,
            default_fields: entry.fields.clone(),
            adapter: entry.adapter.clone(),
            pacing: entry.pacing,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, SiteError> {
    let url = Url::parse(raw.trim()).map_err(|e| SiteError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SiteError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}
