//! HTTP API handlers for eanscout-api
//!
//! JSON over HTTP; every route lives under `/api`.

pub mod health;
pub mod scraper;
pub mod upload;

pub use health::health_routes;
pub use scraper::scraper_routes;
pub use upload::upload_routes;
