//! EAN resolution pipeline
//!
//! Given an EAN: serve the stored record if there is one, otherwise try the
//! site adapters one at a time in priority order and keep the first result
//! that names a product. The outcome, hit or not, is persisted and re-read
//! from the store before being returned.
//!
//! # Caching
//! Under [`CachePolicy::Always`] any stored record is final, including one
//! where nothing matched. [`CachePolicy::RetryUnresolved`] re-scrapes
//! records whose `resolution_status` is still `unresolved`.
//!
//! # Coalescing
//! Resolutions of the same EAN take a per-EAN async gate. The first caller
//! scrapes and inserts; callers queued behind it find the stored record in
//! the cache step.

use crate::adapters::SiteAdapter;
use crate::db::ProductStore;
use crate::models::{normalize_ean, NewProduct, ProductDetails, ProductRecord};
use crate::services::image_acquirer::ImageAcquirer;
use crate::services::text_extractor::{parse_boxes, parse_table};
use eanscout_common::config::CachePolicy;
use eanscout_common::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Gate = Arc<Mutex<()>>;

pub struct ResolutionPipeline {
    store: ProductStore,
    adapters: Vec<Arc<dyn SiteAdapter>>,
    images: ImageAcquirer,
    cache_policy: CachePolicy,
    in_flight: Mutex<HashMap<String, Gate>>,
}

impl ResolutionPipeline {
    /// `adapters` are tried in the order given
    pub fn new(
        store: ProductStore,
        adapters: Vec<Arc<dyn SiteAdapter>>,
        images: ImageAcquirer,
        cache_policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            adapters,
            images,
            cache_policy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Resolve one EAN to a stored product record
    ///
    /// Fails only on an invalid EAN or a storage error; "no source knows
    /// this EAN" is a stored, unresolved record.
    pub async fn resolve(
        &self,
        ean: &str,
        brand: Option<&str>,
        box_id: Option<&str>,
    ) -> Result<ProductRecord> {
        let ean = normalize_ean(ean)?;
        let brand = brand.map(str::trim).filter(|b| !b.is_empty());
        let box_id = box_id.map(str::trim).filter(|b| !b.is_empty());

        let gate = self.gate_for(&ean).await;
        let result = {
            let _guard = gate.lock().await;
            self.resolve_exclusive(&ean, brand, box_id).await
        };
        self.release_gate(&ean, gate).await;

        result
    }

    /// Resolve every EAN of every box group found in `text`
    ///
    /// EANs that fail are logged and left out of the result.
    pub async fn resolve_boxes(&self, text: &str) -> Vec<ProductRecord> {
        let groups = parse_boxes(text);
        info!(
            "Box text holds {} groups, {} EANs",
            groups.len(),
            groups.iter().map(|g| g.eans.len()).sum::<usize>()
        );

        let mut results = Vec::new();
        for group in &groups {
            for ean in &group.eans {
                match self
                    .resolve(ean, Some(&group.brand), Some(&group.box_id))
                    .await
                {
                    Ok(record) => results.push(record),
                    Err(e) => {
                        warn!(ean = %ean, box_id = %group.box_id, error = %e, "Skipping EAN from box text")
                    }
                }
            }
        }

        results
    }

    /// Resolve every usable row of CSV input
    ///
    /// Fails only when the CSV itself cannot be read; row failures are
    /// logged and skipped.
    pub async fn resolve_table(&self, csv_data: &str) -> Result<Vec<ProductRecord>> {
        let rows = parse_table(csv_data)?;
        info!("CSV holds {} usable rows", rows.len());

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            match self
                .resolve(&row.ean, row.brand.as_deref(), row.box_id.as_deref())
                .await
            {
                Ok(record) => results.push(record),
                Err(e) => warn!(ean = %row.ean, error = %e, "Skipping CSV row"),
            }
        }

        Ok(results)
    }

    async fn resolve_exclusive(
        &self,
        ean: &str,
        brand: Option<&str>,
        box_id: Option<&str>,
    ) -> Result<ProductRecord> {
        if let Some(existing) = self.store.get_by_ean(ean).await? {
            if existing.is_resolved() || self.cache_policy == CachePolicy::Always {
                debug!(ean = %ean, "Serving stored record");
                return Ok(existing);
            }
            return self.retry_unresolved(existing, brand, box_id).await;
        }

        let seed = NewProduct::seed(ean, brand, box_id);
        let hit = self.first_hit(ean, brand).await;
        let product = match &hit {
            Some(details) => seed.merge(details),
            None => {
                info!(ean = %ean, "No source matched, storing unresolved record");
                seed
            }
        };

        match self.store.create(&product).await {
            Ok(_) => {}
            Err(Error::Storage(sqlx::Error::Database(db_err))) if db_err.is_unique_violation() => {
                warn!(ean = %ean, "Record inserted concurrently, serving stored version");
            }
            Err(e) => return Err(e),
        }

        if let Some(details) = &hit {
            self.acquire_image(ean, details).await;
        }

        self.reload(ean).await
    }

    async fn retry_unresolved(
        &self,
        existing: ProductRecord,
        brand: Option<&str>,
        box_id: Option<&str>,
    ) -> Result<ProductRecord> {
        let ean = existing.ean.as_str();
        info!(ean = %ean, "Re-resolving unresolved record");

        let brand = brand.or(Some(existing.brand.as_str()).filter(|b| !b.is_empty()));
        let box_id = box_id.or(Some(existing.box_number.as_str()).filter(|b| !b.is_empty()));

        let Some(details) = self.first_hit(ean, brand).await else {
            return Ok(existing);
        };

        let merged = NewProduct::seed(ean, brand, box_id).merge(&details);
        self.store.update(ean, &merged).await?;
        self.acquire_image(ean, &details).await;

        self.reload(ean).await
    }

    /// Adapters in order, stopping at the first named product
    async fn first_hit(&self, ean: &str, brand: Option<&str>) -> Option<ProductDetails> {
        for adapter in &self.adapters {
            let details = adapter.resolve(ean, brand).await;
            if details.is_hit() {
                info!(ean = %ean, adapter = adapter.name(), name = %details.name, "Product found");
                return Some(details);
            }
            debug!(ean = %ean, adapter = adapter.name(), "Not found");
        }
        None
    }

    /// Image failures never fail the resolution
    async fn acquire_image(&self, ean: &str, details: &ProductDetails) {
        let url = details.image_url.trim();
        if url.is_empty() {
            return;
        }

        let color = Some(details.color.as_str());
        let size = Some(details.size.as_str());
        match self.images.acquire(ean, url, color, size).await {
            Ok(Some(_)) => {}
            Ok(None) => debug!(ean = %ean, url = %url, "No image stored"),
            Err(e) => warn!(ean = %ean, url = %url, error = %e, "Image acquisition failed"),
        }
    }

    async fn reload(&self, ean: &str) -> Result<ProductRecord> {
        self.store
            .get_by_ean(ean)
            .await?
            .ok_or_else(|| Error::ProductNotFound(ean.to_string()))
    }

    async fn gate_for(&self, ean: &str) -> Gate {
        let mut in_flight = self.in_flight.lock().await;
        in_flight
            .entry(ean.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other caller holds the gate
    async fn release_gate(&self, ean: &str, gate: Gate) {
        let mut in_flight = self.in_flight.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&gate) <= 2 {
            in_flight.remove(ean);
        }
    }
}
