//! Site adapters
//!
//! Each adapter turns an EAN into a [`ProductDetails`] by querying one
//! retail or price-comparison site and scraping the returned HTML.
//!
//! # Architecture
//! - [`SiteAdapter`]: the one operation the resolution pipeline calls
//! - [`celio`]: brand storefront search pages
//! - [`modov`]: price-comparison domains with per-domain URL templates
//! - [`registry`]: maps a site-kind key plus a [`SiteConfig`] to an adapter
//!
//! Adapters never fail outward. Network errors, non-200 responses and
//! unparseable pages all log a warning and yield a not-found result
//! (blank `name`), so one broken site never stops the pipeline.
//!
//! [`SiteConfig`]: eanscout_common::config::SiteConfig

pub mod celio;
mod html;
pub mod modov;
pub mod registry;

pub use celio::CelioAdapter;
pub use modov::ModovAdapter;
pub use registry::{AdapterRegistry, SiteKind};

use crate::models::ProductDetails;
use async_trait::async_trait;
use eanscout_common::config::ScraperConfig;
use eanscout_common::{Error, Result};
use reqwest::Client;
use thiserror::Error as ThisError;

/// Failure inside a single adapter fetch
///
/// Never leaves the adapter; converted to a not-found result.
#[derive(Debug, ThisError)]
pub enum AdapterError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One configured site that can look up an EAN
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Display name used in logs (e.g. `celio:celiostore.cz`)
    fn name(&self) -> &str;

    fn kind(&self) -> SiteKind;

    /// Look up one normalized EAN
    ///
    /// `brand` is the caller-supplied hint, if any. A result with an empty
    /// `name` means "not found here".
    async fn resolve(&self, ean: &str, brand: Option<&str>) -> ProductDetails;
}

/// Shared outbound HTTP client with the configured timeout and user agent
pub fn build_http_client(config: &ScraperConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
}
