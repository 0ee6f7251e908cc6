//! Adapter registry
//!
//! Site kinds are a closed set. Each kind has one constructor taking a
//! [`SiteConfig`] and the shared HTTP client; the registry validates the
//! configuration and hands back a trait object for the pipeline.

use super::{CelioAdapter, ModovAdapter, SiteAdapter};
use eanscout_common::config::{ScraperConfig, SiteConfig};
use eanscout_common::{Error, Result};
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Known adapter families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Celio,
    Modov,
}

type AdapterConstructor = fn(SiteConfig, Client) -> Result<Arc<dyn SiteAdapter>>;

/// Registration table: key, kind, constructor
const REGISTRY: &[(&str, SiteKind, AdapterConstructor)] = &[
    ("celio", SiteKind::Celio, build_celio),
    ("modov", SiteKind::Modov, build_modov),
];

fn build_celio(site: SiteConfig, client: Client) -> Result<Arc<dyn SiteAdapter>> {
    Ok(Arc::new(CelioAdapter::new(site, client)?))
}

fn build_modov(site: SiteConfig, client: Client) -> Result<Arc<dyn SiteAdapter>> {
    Ok(Arc::new(ModovAdapter::new(site, client)?))
}

impl SiteKind {
    pub fn key(&self) -> &'static str {
        match self {
            SiteKind::Celio => "celio",
            SiteKind::Modov => "modov",
        }
    }

    fn constructor(&self) -> AdapterConstructor {
        match self {
            SiteKind::Celio => build_celio,
            SiteKind::Modov => build_modov,
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SiteKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        REGISTRY
            .iter()
            .find(|(name, _, _)| *name == key)
            .map(|(_, kind, _)| *kind)
            .ok_or_else(|| Error::UnsupportedSiteKind(s.to_string()))
    }
}

/// Builds adapters that share one HTTP client
#[derive(Clone)]
pub struct AdapterRegistry {
    http_client: Client,
}

impl AdapterRegistry {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Registered site-kind keys
    pub fn kinds() -> Vec<&'static str> {
        REGISTRY.iter().map(|(key, _, _)| *key).collect()
    }

    /// Look up `site_kind` and construct it from `config`
    ///
    /// Unknown keys fail with `UnsupportedSiteKind`; missing required
    /// fields fail with a configuration error.
    pub fn resolve(&self, site_kind: &str, config: &SiteConfig) -> Result<Arc<dyn SiteAdapter>> {
        let kind: SiteKind = site_kind.parse()?;
        self.build(kind, config)
    }

    pub fn build(&self, kind: SiteKind, config: &SiteConfig) -> Result<Arc<dyn SiteAdapter>> {
        (kind.constructor())(config.clone(), self.http_client.clone())
    }

    /// Adapters in pipeline order: celio sites in list order, then modov
    /// domains by ascending priority
    pub fn ordered_adapters(&self, config: &ScraperConfig) -> Result<Vec<Arc<dyn SiteAdapter>>> {
        let mut adapters = Vec::with_capacity(config.celio_sites.len() + config.modov_domains.len());

        for site in &config.celio_sites {
            adapters.push(self.build(SiteKind::Celio, site)?);
        }
        for domain in config.modov_by_priority() {
            adapters.push(self.build(SiteKind::Modov, domain)?);
        }

        info!(
            "Configured {} site adapters: {}",
            adapters.len(),
            adapters
                .iter()
                .map(|a| a.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(adapters)
    }
}
