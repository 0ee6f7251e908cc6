//! Shared fixtures for eanscout-api integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use eanscout_api::adapters::{SiteAdapter, SiteKind};
use eanscout_api::db::ProductStore;
use eanscout_api::models::ProductDetails;
use eanscout_api::services::{ImageAcquirer, ResolutionPipeline, TaskRegistry};
use eanscout_api::AppState;
use eanscout_common::config::{CachePolicy, ImageConfig, TaskConfig};
use sqlx::SqlitePool;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Temporary database plus image directory
///
/// `_dir` must stay alive for the duration of the test.
pub struct TestEnv {
    pub _dir: TempDir,
    pub pool: SqlitePool,
    pub store: ProductStore,
    pub image_dir: PathBuf,
}

pub async fn test_env() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let pool = eanscout_common::db::init_database(&dir.path().join("test.db"))
        .await
        .unwrap();
    let image_dir = dir.path().join("product_images");

    TestEnv {
        store: ProductStore::new(pool.clone()),
        pool,
        image_dir,
        _dir: dir,
    }
}

impl TestEnv {
    pub fn acquirer(&self, max_images: usize) -> ImageAcquirer {
        ImageAcquirer::new(
            self.store.clone(),
            reqwest::Client::new(),
            self.image_dir.clone(),
            image_config(max_images),
        )
    }

    pub fn pipeline(
        &self,
        adapters: Vec<Arc<dyn SiteAdapter>>,
        policy: CachePolicy,
    ) -> Arc<ResolutionPipeline> {
        Arc::new(ResolutionPipeline::new(
            self.store.clone(),
            adapters,
            self.acquirer(3),
            policy,
        ))
    }

    pub fn app_state(&self, adapters: Vec<Arc<dyn SiteAdapter>>) -> AppState {
        let pipeline = self.pipeline(adapters, CachePolicy::Always);
        let tasks = TaskRegistry::new(Arc::clone(&pipeline), &TaskConfig::default());
        AppState::new(self.store.clone(), pipeline, tasks, self.acquirer(3))
    }

    /// Files currently in the image directory
    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(&self.image_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn image_config(max_images: usize) -> ImageConfig {
    ImageConfig {
        max_images_per_product: max_images,
        ..ImageConfig::default()
    }
}

/// Adapter returning a fixed result and counting its calls
pub struct StubAdapter {
    name: String,
    result: ProductDetails,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubAdapter {
    /// Adapter that never finds anything
    pub fn miss(name: &str) -> Self {
        Self::with_result(name, ProductDetails::default())
    }

    /// Adapter that finds a product called `product_name`
    pub fn hit(name: &str, product_name: &str) -> Self {
        Self::with_result(
            name,
            ProductDetails {
                name: product_name.to_string(),
                source: name.to_string(),
                ..ProductDetails::default()
            },
        )
    }

    pub fn with_result(name: &str, result: ProductDetails) -> Self {
        Self {
            name: name.to_string(),
            result,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Call counter, readable after the adapter is moved into a pipeline
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn shared(self) -> Arc<dyn SiteAdapter> {
        Arc::new(self)
    }
}

#[async_trait]
impl SiteAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SiteKind {
        SiteKind::Celio
    }

    async fn resolve(&self, _ean: &str, _brand: Option<&str>) -> ProductDetails {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Solid-color PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}
