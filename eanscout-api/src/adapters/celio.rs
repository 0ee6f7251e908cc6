//! Celio storefront adapter
//!
//! Issues `GET {base_url}?{param}={ean}` against a Celio country shop and
//! reads the first `<article>` of the search results page.

use super::html::{absolute_url, first_text, image_source};
use super::{AdapterError, SiteAdapter, SiteKind};
use crate::models::ProductDetails;
use async_trait::async_trait;
use eanscout_common::config::SiteConfig;
use eanscout_common::{Error, Result};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, warn};

/// Brand and source label stamped on every Celio result
pub const CELIO_BRAND: &str = "CELIO";

pub struct CelioAdapter {
    http_client: Client,
    site: SiteConfig,
    name: String,
}

impl CelioAdapter {
    /// Requires `base_url` and `site_name`
    pub fn new(site: SiteConfig, http_client: Client) -> Result<Self> {
        if site.base_url.trim().is_empty() {
            return Err(Error::Config("celio site requires base_url".to_string()));
        }
        if site.site_name.trim().is_empty() {
            return Err(Error::Config(format!(
                "celio site {} requires site_name",
                site.base_url
            )));
        }

        Ok(Self {
            name: format!("celio:{}", site.site_name),
            http_client,
            site,
        })
    }

    fn not_found(&self) -> ProductDetails {
        ProductDetails {
            brand: CELIO_BRAND.to_string(),
            source: CELIO_BRAND.to_string(),
            source_url: self.site.base_url.clone(),
            ..ProductDetails::default()
        }
    }

    async fn fetch(&self, ean: &str) -> std::result::Result<ProductDetails, AdapterError> {
        let response = self
            .http_client
            .get(&self.site.base_url)
            .query(&[(self.site.param.as_str(), ean)])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(AdapterError::Status(response.status().as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(parse_search_page(&body, &self.site.site_name, &final_url).unwrap_or_else(|| {
            debug!(site = %self.name, ean = %ean, "No product article on results page");
            ProductDetails {
                source_url: final_url.clone(),
                ..self.not_found()
            }
        }))
    }
}

#[async_trait]
impl SiteAdapter for CelioAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SiteKind {
        SiteKind::Celio
    }

    async fn resolve(&self, ean: &str, _brand: Option<&str>) -> ProductDetails {
        match self.fetch(ean).await {
            Ok(details) => details,
            Err(e) => {
                warn!(site = %self.name, ean = %ean, error = %e, "Celio lookup failed");
                self.not_found()
            }
        }
    }
}

/// Extract a product from a Celio search results page
///
/// Returns `None` when the page holds no `<article>`.
pub fn parse_search_page(html: &str, site_name: &str, source_url: &str) -> Option<ProductDetails> {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article").ok()?;
    let article = document.select(&article_selector).next()?;

    let image_url = Selector::parse("img")
        .ok()
        .and_then(|img| article.select(&img).next())
        .and_then(image_source)
        .map(|src| absolute_url(&src, site_name))
        .unwrap_or_default();

    Some(ProductDetails {
        brand: CELIO_BRAND.to_string(),
        name: first_text(article, &["h1"]).unwrap_or_default(),
        description: first_text(article, &[".description", ".product-description"])
            .unwrap_or_default(),
        size: first_text(article, &[".size", ".variant"]).unwrap_or_default(),
        color: first_text(article, &[".color", ".couleur"]).unwrap_or_default(),
        price: first_text(article, &["[class*=\"price\"]"]).unwrap_or_default(),
        image_url,
        source: CELIO_BRAND.to_string(),
        source_url: source_url.to_string(),
        ..ProductDetails::default()
    })
}
