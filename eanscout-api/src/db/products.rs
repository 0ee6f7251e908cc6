//! Product and image persistence
//!
//! [`ProductStore`] is the only writer of `products` and `product_images`.
//! Every operation is a single statement or a single transaction, so the
//! SQLite write lock is the serialization point between concurrent
//! resolutions. Writes retry on lock contention via [`retry_on_lock`].

use crate::models::{NewImage, NewProduct, ProductImage, ProductRecord, ResolutionStatus};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use eanscout_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

const PRODUCT_COLUMNS: &str = "id, ean, brand, category, name, description, color, size, \
     long_description, source, source_url, price, box_number, resolution_status, \
     created_at, updated_at";

const IMAGE_COLUMNS: &str = "id, product_ean, image_url, local_path, is_primary, created_at";

/// Persistence boundary for products and their images
#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Product with its images, primary first
    pub async fn get_by_ean(&self, ean: &str) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM products WHERE ean = ?",
            PRODUCT_COLUMNS
        ))
        .bind(ean)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut product = product_from_row(&row)?;
                product.images = self.list_images(ean).await?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    /// Insert a new product; an existing EAN is a unique-constraint
    /// storage error, never an overwrite
    pub async fn create(&self, product: &NewProduct) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id = retry_on_lock("create_product", self.max_lock_wait_ms, || {
            insert_product(&self.pool, product, &now)
        })
        .await?;

        debug!(ean = %product.ean, id, status = product.resolution_status.as_str(), "Product stored");
        Ok(id)
    }

    /// Rewrite the descriptive fields of an existing product
    ///
    /// Returns false when no product has this EAN.
    pub async fn update(&self, ean: &str, product: &NewProduct) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        retry_on_lock("update_product", self.max_lock_wait_ms, || {
            update_product(&self.pool, ean, product, &now)
        })
        .await
    }

    /// Newest first; `brand` is a substring filter
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        brand: Option<&str>,
    ) -> Result<Vec<ProductRecord>> {
        let rows = match brand {
            Some(brand) => {
                sqlx::query(&format!(
                    "SELECT {} FROM products WHERE brand LIKE ? \
                     ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                    PRODUCT_COLUMNS
                ))
                .bind(format!("%{}%", brand))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM products ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                    PRODUCT_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut products = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut product = product_from_row(row)?;
            product.images = self.list_images(&product.ean).await?;
            products.push(product);
        }

        Ok(products)
    }

    /// Insert an image row unless the product already holds `max_images`
    ///
    /// Returns `None` when the cap is reached. The count and the insert are
    /// one statement, so concurrent inserts never exceed the cap. The image
    /// becomes primary when requested or when the product has no primary
    /// yet; any previous primary is cleared in the same transaction.
    pub async fn add_image(&self, image: &NewImage, max_images: usize) -> Result<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        retry_on_lock("add_image", self.max_lock_wait_ms, || {
            insert_image(&self.pool, image, max_images, &now)
        })
        .await
    }

    /// Primary first, then insertion order
    pub async fn list_images(&self, ean: &str) -> Result<Vec<ProductImage>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM product_images WHERE product_ean = ? ORDER BY is_primary DESC, id ASC",
            IMAGE_COLUMNS
        ))
        .bind(ean)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(image_from_row).collect()
    }

    pub async fn get_image(&self, image_id: i64) -> Result<Option<ProductImage>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM product_images WHERE id = ?",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(image_from_row).transpose()
    }

    /// Make `image_id` the only primary image of `ean`
    ///
    /// Returns false, changing nothing, when the image does not belong to
    /// the product.
    pub async fn set_primary(&self, ean: &str, image_id: i64) -> Result<bool> {
        let changed = retry_on_lock("set_primary", self.max_lock_wait_ms, || {
            set_primary_image(&self.pool, ean, image_id)
        })
        .await?;

        if changed {
            debug!(ean = %ean, image_id, "Primary image changed");
        }
        Ok(changed)
    }

    /// Delete one image row; the oldest remaining image is promoted when
    /// the primary is removed
    pub async fn delete_image(&self, image_id: i64) -> Result<bool> {
        retry_on_lock("delete_image", self.max_lock_wait_ms, || {
            remove_image(&self.pool, image_id)
        })
        .await
    }

    pub async fn count_images(&self, ean: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_images WHERE product_ean = ?")
            .bind(ean)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as usize)
    }
}

async fn insert_product(pool: &SqlitePool, product: &NewProduct, now: &str) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO products (
            ean, brand, category, name, description, color, size,
            long_description, source, source_url, price, box_number,
            resolution_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&product.ean)
    .bind(&product.brand)
    .bind(&product.category)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.color)
    .bind(&product.size)
    .bind(&product.long_description)
    .bind(&product.source)
    .bind(&product.source_url)
    .bind(&product.price)
    .bind(&product.box_number)
    .bind(product.resolution_status.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn update_product(
    pool: &SqlitePool,
    ean: &str,
    product: &NewProduct,
    now: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            brand = ?, category = ?, name = ?, description = ?, color = ?,
            size = ?, long_description = ?, source = ?, source_url = ?,
            price = ?, box_number = ?, resolution_status = ?, updated_at = ?
        WHERE ean = ?
        "#,
    )
    .bind(&product.brand)
    .bind(&product.category)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.color)
    .bind(&product.size)
    .bind(&product.long_description)
    .bind(&product.source)
    .bind(&product.source_url)
    .bind(&product.price)
    .bind(&product.box_number)
    .bind(product.resolution_status.as_str())
    .bind(now)
    .bind(ean)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_image(
    pool: &SqlitePool,
    image: &NewImage,
    max_images: usize,
    now: &str,
) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;

    // Writing first takes the write lock before the count is evaluated
    let inserted = sqlx::query(
        "INSERT INTO product_images (product_ean, image_url, local_path, is_primary, created_at) \
         SELECT ?, ?, ?, 0, ? \
         WHERE (SELECT COUNT(*) FROM product_images WHERE product_ean = ?) < ?",
    )
    .bind(&image.product_ean)
    .bind(&image.image_url)
    .bind(&image.local_path)
    .bind(now)
    .bind(&image.product_ean)
    .bind(max_images as i64)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }
    let image_id = inserted.last_insert_rowid();

    let primaries: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM product_images WHERE product_ean = ? AND is_primary = 1",
    )
    .bind(&image.product_ean)
    .fetch_one(&mut *tx)
    .await?;

    if image.is_primary || primaries == 0 {
        sqlx::query(
            "UPDATE product_images SET is_primary = CASE WHEN id = ? THEN 1 ELSE 0 END \
             WHERE product_ean = ?",
        )
        .bind(image_id)
        .bind(&image.product_ean)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some(image_id))
}

/// Single statement: nothing changes unless the image belongs to `ean`
async fn set_primary_image(pool: &SqlitePool, ean: &str, image_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE product_images SET is_primary = CASE WHEN id = ? THEN 1 ELSE 0 END \
         WHERE product_ean = ? \
         AND EXISTS (SELECT 1 FROM product_images WHERE id = ? AND product_ean = ?)",
    )
    .bind(image_id)
    .bind(ean)
    .bind(image_id)
    .bind(ean)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn remove_image(pool: &SqlitePool, image_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("DELETE FROM product_images WHERE id = ? RETURNING product_ean, is_primary")
        .bind(image_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = row else {
        tx.rollback().await?;
        return Ok(false);
    };
    let ean: String = row.try_get("product_ean")?;
    let was_primary = row.try_get::<i64, _>("is_primary")? != 0;

    if was_primary {
        sqlx::query(
            "UPDATE product_images SET is_primary = 1 WHERE id = \
             (SELECT id FROM product_images WHERE product_ean = ? ORDER BY id ASC LIMIT 1)",
        )
        .bind(&ean)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(ean = %ean, image_id, was_primary, "Image row deleted");
    Ok(true)
}

fn product_from_row(row: &SqliteRow) -> Result<ProductRecord> {
    let text = |column: &str| -> Result<String> {
        Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
    };

    Ok(ProductRecord {
        id: row.try_get("id")?,
        ean: row.try_get("ean")?,
        brand: text("brand")?,
        category: text("category")?,
        name: text("name")?,
        description: text("description")?,
        color: text("color")?,
        size: text("size")?,
        long_description: text("long_description")?,
        source: text("source")?,
        source_url: text("source_url")?,
        price: text("price")?,
        box_number: text("box_number")?,
        resolution_status: ResolutionStatus::from_db(&text("resolution_status")?),
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        images: Vec::new(),
    })
}

fn image_from_row(row: &SqliteRow) -> Result<ProductImage> {
    Ok(ProductImage {
        id: row.try_get("id")?,
        product_ean: row.try_get("product_ean")?,
        image_url: row.try_get("image_url")?,
        local_path: row.try_get("local_path")?,
        is_primary: row.try_get::<i64, _>("is_primary")? != 0,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

/// RFC 3339, or the space-separated form older databases hold
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}
