//! eanscout-api library interface
//!
//! Resolves EAN-13 barcodes to product metadata by scraping retail and
//! price-comparison sites, caches results in SQLite, stores product images,
//! and runs batch work in the background. Exposed as a library for
//! integration testing; `main.rs` wires it to a TCP listener.

pub mod adapters;
pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use adapters::{build_http_client, AdapterRegistry};
use axum::Router;
use chrono::{DateTime, Utc};
use db::ProductStore;
use eanscout_common::config::TomlConfig;
use eanscout_common::Result;
use services::{ImageAcquirer, ResolutionPipeline, TaskRegistry};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Product and image persistence
    pub store: ProductStore,
    /// Cache check plus adapter fan-out
    pub pipeline: Arc<ResolutionPipeline>,
    /// Background resolution tasks
    pub tasks: TaskRegistry,
    /// Image upload, listing and deletion
    pub images: ImageAcquirer,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: ProductStore,
        pipeline: Arc<ResolutionPipeline>,
        tasks: TaskRegistry,
        images: ImageAcquirer,
    ) -> Self {
        Self {
            store,
            pipeline,
            tasks,
            images,
            startup_time: Utc::now(),
        }
    }

    /// Build every component from configuration
    ///
    /// One HTTP client is shared by all adapters and the image acquirer.
    /// Fails on an adapter configuration error.
    pub fn from_config(pool: SqlitePool, config: &TomlConfig, image_dir: PathBuf) -> Result<Self> {
        let http_client = build_http_client(&config.scraper)?;
        let store = ProductStore::new(pool);

        let images = ImageAcquirer::new(
            store.clone(),
            http_client.clone(),
            image_dir,
            config.images.clone(),
        );

        let adapters = AdapterRegistry::new(http_client).ordered_adapters(&config.scraper)?;
        let pipeline = Arc::new(ResolutionPipeline::new(
            store.clone(),
            adapters,
            images.clone(),
            config.scraper.cache_policy,
        ));
        let tasks = TaskRegistry::new(Arc::clone(&pipeline), &config.tasks);

        Ok(Self::new(store, pipeline, tasks, images))
    }
}

/// Build application router
///
/// JSON API under `/api`, stored images under `/static/product_images`.
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.images.config().max_file_size_bytes();
    let image_dir = state.images.storage_dir().to_path_buf();

    Router::new()
        .merge(api::scraper_routes())
        .merge(api::upload_routes(max_upload))
        .merge(api::health_routes())
        .nest_service("/static/product_images", ServeDir::new(image_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
