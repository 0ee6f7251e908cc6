//! Site adapter tests against a local mock HTTP server

use eanscout_api::adapters::{AdapterRegistry, CelioAdapter, ModovAdapter, SiteAdapter, SiteKind};
use eanscout_common::config::{ScraperConfig, SiteConfig};
use eanscout_common::Error;
use reqwest::Client;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EAN: &str = "3596655503845";

const CELIO_RESULTS: &str = r#"
<html><body>
  <article>
    <h1>  Pull col rond
      Jersey </h1>
    <p class="description">Maille fine</p>
    <span class="size">L</span>
    <span class="color">Gris</span>
    <span class="price">39,99 €</span>
    <img src="https://cdn.example.test/pull.jpg">
  </article>
</body></html>
"#;

const MODOV_PAGE: &str = r#"
<html><body>
  <nav class="breadcrumb"><a href="/">Home</a><a href="/men">Men</a><a href="/men/shirts">Shirts</a></nav>
  <h1>Oxford shirt</h1>
  <div class="description">Cotton oxford</div>
  <span class="price">24 EUR</span>
  <img class="logo" src="/logo.png">
  <img class="Product-Photo" src="/photos/oxford.jpg">
</body></html>
"#;

fn celio(server: &MockServer) -> CelioAdapter {
    let site = SiteConfig::celio(
        &format!("{}/hledat", server.uri()),
        "celiostore.cz",
        "query",
        "CZ",
    );
    CelioAdapter::new(site, Client::new()).unwrap()
}

#[tokio::test]
async fn test_celio_search_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hledat"))
        .and(query_param("query", EAN))
        .respond_with(ResponseTemplate::new(200).set_body_string(CELIO_RESULTS))
        .expect(1)
        .mount(&server)
        .await;

    let details = celio(&server).resolve(EAN, None).await;

    assert_eq!(details.name, "Pull col rond Jersey");
    assert_eq!(details.description, "Maille fine");
    assert_eq!(details.size, "L");
    assert_eq!(details.color, "Gris");
    assert_eq!(details.price, "39,99 €");
    assert_eq!(details.image_url, "https://cdn.example.test/pull.jpg");
    assert_eq!(details.brand, "CELIO");
    assert!(details.source_url.contains(&format!("query={}", EAN)));
}

#[tokio::test]
async fn test_celio_error_status_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let details = celio(&server).resolve(EAN, None).await;

    assert!(!details.is_hit());
    assert_eq!(details.brand, "CELIO");
    assert_eq!(details.source, "CELIO");
}

#[tokio::test]
async fn test_celio_empty_results_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Nic</body></html>"))
        .mount(&server)
        .await;

    let details = celio(&server).resolve(EAN, None).await;

    assert!(!details.is_hit());
}

#[tokio::test]
async fn test_unreachable_site_is_not_found() {
    let site = SiteConfig::celio("http://127.0.0.1:1/search", "celio.tn", "q", "TN");
    let adapter = CelioAdapter::new(site, Client::new()).unwrap();

    let details = adapter.resolve(EAN, Some("Jules")).await;

    assert!(!details.is_hit());
    assert_eq!(details.source_url, "http://127.0.0.1:1/search");
}

#[tokio::test]
async fn test_modov_product_page_via_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hledani/"))
        .and(query_param("q", EAN))
        .respond_with(ResponseTemplate::new(200).set_body_string(MODOV_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let site = SiteConfig {
        base_url: server.uri(),
        ..SiteConfig::modov("zbozi.cz", 2, "CZ")
    };
    let adapter = ModovAdapter::new(site, Client::new()).unwrap();

    let details = adapter.resolve(EAN, Some("Celio")).await;

    assert_eq!(details.name, "Oxford shirt");
    assert_eq!(details.brand, "Celio", "Brand hint fills a missing brand");
    assert_eq!(details.category, "Shirts");
    assert_eq!(details.description, "Cotton oxford");
    assert_eq!(details.price, "24 EUR");
    assert_eq!(details.image_url, "https://zbozi.cz/photos/oxford.jpg");
    assert_eq!(details.source, "Modov (zbozi.cz)");
    assert!(details.source_url.starts_with(&server.uri()));
}

#[tokio::test]
async fn test_modov_missing_page_keeps_hint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let site = SiteConfig {
        base_url: server.uri(),
        ..SiteConfig::modov("modov.sk", 1, "SK")
    };
    let adapter = ModovAdapter::new(site, Client::new()).unwrap();

    let details = adapter.resolve(EAN, Some("Celio")).await;

    assert!(!details.is_hit());
    assert_eq!(details.brand, "Celio");
    assert_eq!(details.source_url, format!("{}/{}/", server.uri(), EAN));
}

#[test]
fn test_registry_rejects_unknown_kind() {
    let registry = AdapterRegistry::new(Client::new());
    let site = SiteConfig::modov("example.test", 1, "XX");

    let err = registry.resolve("amazon", &site).err().unwrap();

    assert!(matches!(err, Error::UnsupportedSiteKind(_)));
}

#[test]
fn test_registry_builds_by_key() {
    let registry = AdapterRegistry::new(Client::new());
    let site = SiteConfig::modov("ceneo.pl", 5, "PL");

    let adapter = registry.resolve("modov", &site).unwrap();

    assert_eq!(adapter.kind(), SiteKind::Modov);
    assert_eq!(adapter.name(), "modov:ceneo.pl");
}

#[test]
fn test_default_resolution_order() {
    let registry = AdapterRegistry::new(Client::new());
    let adapters = registry.ordered_adapters(&ScraperConfig::default()).unwrap();

    let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
    assert_eq!(names.first(), Some(&"celio:celiostore.cz"));
    assert_eq!(names[4], "modov:modov.sk");
    assert_eq!(names.last(), Some(&"modov:idealo.de"));
}
