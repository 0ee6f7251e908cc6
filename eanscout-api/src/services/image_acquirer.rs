//! Product image acquisition and storage
//!
//! Downloads (or accepts uploaded) product images, normalizes them to JPEG
//! no larger than 1200 px on either side, writes them under the image
//! storage directory, and records them through the [`ProductStore`].
//!
//! File names follow `{ean}-{size}-{color}-{timestamp}.jpg`, uploads
//! `{ean}-{size}-{color}-{timestamp}-upload{ext}`; a name already on disk
//! gets a `-{n}` suffix before the extension. Stored files are served by
//! name, so the layout is externally visible.

use crate::db::ProductStore;
use crate::models::{NewImage, ProductImage};
use chrono::{DateTime, Utc};
use eanscout_common::config::ImageConfig;
use eanscout_common::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::{Client, StatusCode};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Longest side of a stored image
pub const MAX_DIMENSION: u32 = 1200;

pub const JPEG_QUALITY: u8 = 85;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Numbered variants tried when a file name is already taken
const MAX_NAME_SUFFIX: u32 = 100;

#[derive(Clone)]
pub struct ImageAcquirer {
    store: ProductStore,
    http_client: Client,
    storage_dir: PathBuf,
    config: ImageConfig,
}

impl ImageAcquirer {
    pub fn new(
        store: ProductStore,
        http_client: Client,
        storage_dir: PathBuf,
        config: ImageConfig,
    ) -> Self {
        Self {
            store,
            http_client,
            storage_dir,
            config,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Download `image_url` and store it for `ean`
    ///
    /// Returns `Ok(None)` when the product already holds the maximum number
    /// of images, or when the server answers with anything but 200; nothing
    /// is left on disk in either case. Undecodable downloads are stored as
    /// received.
    pub async fn acquire(
        &self,
        ean: &str,
        image_url: &str,
        color: Option<&str>,
        size: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let existing = self.store.count_images(ean).await?;
        if existing >= self.config.max_images_per_product {
            info!(
                ean = %ean,
                existing,
                max = self.config.max_images_per_product,
                "Image cap reached, skipping download"
            );
            return Ok(None);
        }

        let Some(raw) = self.download(image_url).await? else {
            return Ok(None);
        };

        let (raw, normalized) = normalize_blocking(raw).await?;
        let data = match normalized {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!(ean = %ean, url = %image_url, error = %e, "Image not decodable, storing raw bytes");
                raw
            }
        };

        let file_name = image_filename(ean, size, color, Utc::now(), None);
        let Some((path, _)) = self
            .write_and_record(ean, Some(image_url), &file_name, &data, false)
            .await?
        else {
            info!(ean = %ean, max = self.config.max_images_per_product, "Image cap reached, download discarded");
            return Ok(None);
        };

        info!(ean = %ean, path = %path.display(), "Product image stored");
        Ok(Some(path))
    }

    /// Store a user-supplied image for an existing product
    ///
    /// Checks, in order: product exists, image cap, extension, size. The
    /// upload must decode as an image.
    pub async fn store_upload(
        &self,
        ean: &str,
        filename: &str,
        data: Vec<u8>,
        make_primary: bool,
    ) -> Result<ProductImage> {
        let product = self
            .store
            .get_by_ean(ean)
            .await?
            .ok_or_else(|| Error::ProductNotFound(ean.to_string()))?;

        if product.images.len() >= self.config.max_images_per_product {
            return Err(self.cap_reached());
        }

        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();
        if !self.config.is_allowed_extension(&ext) {
            return Err(Error::InvalidInput(format!(
                "File type not allowed. Allowed: {}",
                self.config.allowed_extensions.join(", ")
            )));
        }

        if data.len() > self.config.max_file_size_bytes() {
            return Err(Error::InvalidInput(format!(
                "File too large (max {} MB)",
                self.config.max_file_size_mb
            )));
        }

        let (_, normalized) = normalize_blocking(data).await?;
        let jpeg = normalized.map_err(|e| {
            Error::InvalidInput(format!("Uploaded file is not a readable image: {}", e))
        })?;

        let file_name = image_filename(
            ean,
            Some(&product.size),
            Some(&product.color),
            Utc::now(),
            Some(&ext),
        );
        let (path, image_id) = self
            .write_and_record(ean, None, &file_name, &jpeg, make_primary)
            .await?
            .ok_or_else(|| self.cap_reached())?;

        info!(ean = %ean, image_id, path = %path.display(), "Uploaded image stored");
        self.store
            .get_image(image_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Image {} vanished after insert", image_id)))
    }

    pub async fn list(&self, ean: &str) -> Result<Vec<ProductImage>> {
        self.store.list_images(ean).await
    }

    /// Make `image_id` the primary image of `ean`; false if it belongs elsewhere
    pub async fn set_primary(&self, ean: &str, image_id: i64) -> Result<bool> {
        self.store.set_primary(ean, image_id).await
    }

    /// Remove an image row and its file
    ///
    /// The image must belong to `ean`. A file already missing from disk is
    /// only logged.
    pub async fn delete(&self, ean: &str, image_id: i64) -> Result<()> {
        let image = self
            .store
            .get_image(image_id)
            .await?
            .filter(|image| image.product_ean == ean)
            .ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;

        if !self.store.delete_image(image_id).await? {
            return Err(Error::ImageNotFound(image_id.to_string()));
        }

        if let Err(e) = tokio::fs::remove_file(&image.local_path).await {
            warn!(ean = %ean, path = %image.local_path, error = %e, "Failed to remove image file");
        }

        info!(ean = %ean, image_id, "Image deleted");
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Acquisition(format!("GET {} failed: {}", url, e)))?;

        if response.status() != StatusCode::OK {
            warn!(url = %url, status = response.status().as_u16(), "Image download refused");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Acquisition(format!("Reading {} failed: {}", url, e)))?;

        debug!(url = %url, bytes = bytes.len(), "Image downloaded");
        Ok(Some(bytes.to_vec()))
    }

    fn cap_reached(&self) -> Error {
        Error::InvalidInput(format!(
            "Maximum {} images per product",
            self.config.max_images_per_product
        ))
    }

    /// Write the file under a name no other image holds, then insert its row
    ///
    /// Returns `None` when the product reached its image cap. The file is
    /// removed whenever no row ends up pointing at it.
    async fn write_and_record(
        &self,
        ean: &str,
        image_url: Option<&str>,
        file_name: &str,
        data: &[u8],
        make_primary: bool,
    ) -> Result<Option<(PathBuf, i64)>> {
        let (path, mut file) = create_unique(&self.storage_dir, file_name).await?;

        let written = match file.write_all(data).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        drop(file);
        if let Err(e) = written {
            discard_file(&path).await;
            return Err(e.into());
        }

        let image = NewImage {
            product_ean: ean.to_string(),
            image_url: image_url.map(str::to_string),
            local_path: path.to_string_lossy().into_owned(),
            is_primary: make_primary,
        };

        match self
            .store
            .add_image(&image, self.config.max_images_per_product)
            .await
        {
            Ok(Some(id)) => Ok(Some((path, id))),
            Ok(None) => {
                discard_file(&path).await;
                Ok(None)
            }
            Err(e) => {
                discard_file(&path).await;
                Err(e)
            }
        }
    }
}

/// Create `file_name` in `dir`, or the first free `-{n}` variant of it
async fn create_unique(dir: &Path, file_name: &str) -> Result<(PathBuf, tokio::fs::File)> {
    tokio::fs::create_dir_all(dir).await?;

    let (stem, ext) = match file_name.rfind('.') {
        Some(dot) => file_name.split_at(dot),
        None => (file_name, ""),
    };

    for n in 0..=MAX_NAME_SUFFIX {
        let path = if n == 0 {
            dir.join(file_name)
        } else {
            dir.join(format!("{}-{}{}", stem, n, ext))
        };

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Internal(format!(
        "No free file name for {} in {}",
        file_name,
        dir.display()
    )))
}

async fn discard_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove orphaned image file");
    }
}

/// Stored file name for an image of `ean`
///
/// Blank size or color become `none`; whitespace and path separators
/// become `_`. `upload_ext` (with leading dot) marks an upload.
pub fn image_filename(
    ean: &str,
    size: Option<&str>,
    color: Option<&str>,
    at: DateTime<Utc>,
    upload_ext: Option<&str>,
) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT);
    let size = filename_part(size);
    let color = filename_part(color);

    match upload_ext {
        Some(ext) => format!("{}-{}-{}-{}-upload{}", ean, size, color, stamp, ext),
        None => format!("{}-{}-{}-{}.jpg", ean, size, color, stamp),
    }
}

fn filename_part(value: Option<&str>) -> String {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return "none".to_string();
    }

    value
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Decode, downscale and re-encode on the blocking pool
///
/// Hands the input back alongside the outcome so callers can fall back to
/// the raw bytes.
async fn normalize_blocking(
    data: Vec<u8>,
) -> Result<(Vec<u8>, std::result::Result<Vec<u8>, image::ImageError>)> {
    tokio::task::spawn_blocking(move || {
        let result = normalize_jpeg(&data);
        (data, result)
    })
    .await
    .map_err(|e| Error::Internal(format!("Image normalization task failed: {}", e)))
}

/// Fit within [`MAX_DIMENSION`] keeping the aspect ratio, flatten to RGB,
/// encode as JPEG at [`JPEG_QUALITY`]
pub fn normalize_jpeg(data: &[u8]) -> std::result::Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(data)?;

    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(out)
}
