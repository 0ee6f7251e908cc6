//! Price-comparison adapter
//!
//! One instance per domain. The product page URL comes from a per-domain
//! template; unknown domains use the generic `/search?q={ean}` form.
//! A configured `base_url` replaces the `https://{domain}` origin (mirrors,
//! proxies) while the domain still selects the template.

use super::html::{absolute_url, element_text, first_text, image_source};
use super::{AdapterError, SiteAdapter, SiteKind};
use crate::models::ProductDetails;
use async_trait::async_trait;
use eanscout_common::config::SiteConfig;
use eanscout_common::{Error, Result};
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::warn;

pub struct ModovAdapter {
    http_client: Client,
    site: SiteConfig,
    name: String,
}

impl ModovAdapter {
    /// Requires `site_name` (the domain)
    pub fn new(site: SiteConfig, http_client: Client) -> Result<Self> {
        if site.site_name.trim().is_empty() {
            return Err(Error::Config("modov site requires a domain".to_string()));
        }

        Ok(Self {
            name: format!("modov:{}", site.site_name),
            http_client,
            site,
        })
    }

    fn source_label(&self) -> String {
        format!("Modov ({})", self.site.site_name)
    }

    fn origin(&self) -> String {
        let base = self.site.base_url.trim();
        if base.is_empty() {
            format!("https://{}", self.site.site_name)
        } else {
            base.trim_end_matches('/').to_string()
        }
    }

    /// Product page URL for `ean` on this domain
    pub fn target_url(&self, ean: &str) -> String {
        let origin = self.origin();
        match self.site.site_name.as_str() {
            "modov.sk" => format!("{}/{}/", origin, ean),
            "zbozi.cz" => format!("{}/hledani/?q={}", origin, ean),
            "hledejceny.cz" => format!("{}/hledej/{}/", origin, ean),
            _ => format!("{}/search?q={}", origin, ean),
        }
    }

    fn not_found(&self, url: &str, brand: Option<&str>) -> ProductDetails {
        ProductDetails {
            brand: brand.unwrap_or_default().to_string(),
            source: self.source_label(),
            source_url: url.to_string(),
            ..ProductDetails::default()
        }
    }

    async fn fetch(
        &self,
        url: &str,
        brand: Option<&str>,
    ) -> std::result::Result<ProductDetails, AdapterError> {
        let url = url::Url::parse(url)?;
        let response = self.http_client.get(url.clone()).send().await?;

        if response.status() != StatusCode::OK {
            return Err(AdapterError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let mut details = parse_product_page(&body, &self.site.site_name, brand);
        details.source = self.source_label();
        details.source_url = url.to_string();
        Ok(details)
    }
}

#[async_trait]
impl SiteAdapter for ModovAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SiteKind {
        SiteKind::Modov
    }

    async fn resolve(&self, ean: &str, brand: Option<&str>) -> ProductDetails {
        let url = self.target_url(ean);
        match self.fetch(&url, brand).await {
            Ok(details) => details,
            Err(e) => {
                warn!(site = %self.name, ean = %ean, url = %url, error = %e, "Modov lookup failed");
                self.not_found(&url, brand)
            }
        }
    }
}

/// Extract a product from a price-comparison product page
///
/// `brand_hint` fills `brand` when the page carries none.
pub fn parse_product_page(html: &str, domain: &str, brand_hint: Option<&str>) -> ProductDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let brand = first_text(root, &["span.brand", "div.brand"])
        .unwrap_or_else(|| brand_hint.unwrap_or_default().to_string());

    let image_url = Selector::parse("img")
        .ok()
        .and_then(|img| {
            root.select(&img).find(|el| {
                el.value()
                    .attr("class")
                    .map(|class| class.to_lowercase().contains("product"))
                    .unwrap_or(false)
            })
        })
        .and_then(image_source)
        .map(|src| absolute_url(&src, domain))
        .unwrap_or_default();

    let category = Selector::parse(".breadcrumb a, .breadcrumbs a")
        .ok()
        .and_then(|crumbs| root.select(&crumbs).last())
        .map(element_text)
        .unwrap_or_default();

    ProductDetails {
        brand,
        category,
        name: first_text(root, &["h1"]).unwrap_or_default(),
        description: first_text(root, &["div.description", "div.product-description"])
            .unwrap_or_default(),
        size: first_text(root, &[".size"]).unwrap_or_default(),
        color: first_text(root, &[".color"]).unwrap_or_default(),
        price: first_text(root, &["span.price", "div.price"]).unwrap_or_default(),
        image_url,
        ..ProductDetails::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(domain: &str) -> ModovAdapter {
        ModovAdapter::new(SiteConfig::modov(domain, 1, "SK"), Client::new()).unwrap()
    }

    #[test]
    fn test_url_templates_per_domain() {
        let ean = "3596655503845";
        assert_eq!(
            adapter("modov.sk").target_url(ean),
            "https://modov.sk/3596655503845/"
        );
        assert_eq!(
            adapter("zbozi.cz").target_url(ean),
            "https://zbozi.cz/hledani/?q=3596655503845"
        );
        assert_eq!(
            adapter("hledejceny.cz").target_url(ean),
            "https://hledejceny.cz/hledej/3596655503845/"
        );
        assert_eq!(
            adapter("ceneo.pl").target_url(ean),
            "https://ceneo.pl/search?q=3596655503845"
        );
    }

    #[test]
    fn test_base_url_replaces_origin() {
        let mut site = SiteConfig::modov("zbozi.cz", 1, "CZ");
        site.base_url = "http://127.0.0.1:9000/".to_string();
        let adapter = ModovAdapter::new(site, Client::new()).unwrap();
        assert_eq!(
            adapter.target_url("3596655503845"),
            "http://127.0.0.1:9000/hledani/?q=3596655503845"
        );
    }

    #[test]
    fn test_parse_product_page() {
        let page = r#"
            <nav class="breadcrumb"><a>Móda</a><a>Košele</a></nav>
            <h1>Celio Nuslim košeľa</h1>
            <span class="brand">Celio</span>
            <div class="product-description">Bavlnená košeľa</div>
            <img class="logo" src="/logo.png">
            <img class="Product-Photo" src="/img/3596655503845.jpg">
            <span class="price">24,90 €</span>
        "#;

        let details = parse_product_page(page, "modov.sk", Some("CELIO"));

        assert_eq!(details.name, "Celio Nuslim košeľa");
        assert_eq!(details.brand, "Celio");
        assert_eq!(details.category, "Košele");
        assert_eq!(details.description, "Bavlnená košeľa");
        assert_eq!(details.price, "24,90 €");
        assert_eq!(details.image_url, "https://modov.sk/img/3596655503845.jpg");
    }

    #[test]
    fn test_lazy_loaded_product_image() {
        let page = r#"
            <h1>Chino</h1>
            <img class="product-photo" data-src="/x.jpg">
        "#;

        let details = parse_product_page(page, "zbozi.cz", None);

        assert_eq!(details.image_url, "https://zbozi.cz/x.jpg");
    }

    #[test]
    fn test_brand_hint_used_when_page_has_none() {
        let details = parse_product_page("<h1>Tričko</h1>", "zbozi.cz", Some("JULES"));
        assert_eq!(details.brand, "JULES");

        let details = parse_product_page("<p>nic</p>", "zbozi.cz", None);
        assert_eq!(details.brand, "");
        assert!(!details.is_hit());
    }
}
