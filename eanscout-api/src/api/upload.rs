//! Product image API handlers
//!
//! POST/GET /api/upload/:ean, PUT /api/upload/:ean/primary/:image_id,
//! DELETE /api/upload/:ean/:image_id

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get, put},
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    models::{normalize_ean, ProductImage},
    AppState,
};
use eanscout_common::Error;

/// Multipart overhead allowed on top of the file size cap
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Response for primary-image and delete operations
#[derive(Debug, Serialize)]
pub struct ImageActionResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/upload/:ean
///
/// Multipart form with a `file` part and an optional `make_primary` part
/// (`true`/`1`).
pub async fn upload_image(
    State(state): State<AppState>,
    Path(ean): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<ProductImage>> {
    let ean = normalize_ean(&ean)?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut make_primary = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                file = Some((filename, data.to_vec()));
            }
            Some("make_primary") => {
                let value = field.text().await.unwrap_or_default();
                make_primary = matches!(value.trim(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;

    let image = state
        .images
        .store_upload(&ean, &filename, data, make_primary)
        .await?;

    Ok(Json(image))
}

/// GET /api/upload/:ean
pub async fn list_images(
    State(state): State<AppState>,
    Path(ean): Path<String>,
) -> ApiResult<Json<Vec<ProductImage>>> {
    let ean = normalize_ean(&ean)?;
    Ok(Json(state.images.list(&ean).await?))
}

/// PUT /api/upload/:ean/primary/:image_id
pub async fn set_primary_image(
    State(state): State<AppState>,
    Path((ean, image_id)): Path<(String, i64)>,
) -> ApiResult<Json<ImageActionResponse>> {
    let ean = normalize_ean(&ean)?;

    if !state.images.set_primary(&ean, image_id).await? {
        return Err(Error::ImageNotFound(image_id.to_string()).into());
    }

    Ok(Json(ImageActionResponse {
        success: true,
        message: "Primary image updated".to_string(),
    }))
}

/// DELETE /api/upload/:ean/:image_id
pub async fn delete_image(
    State(state): State<AppState>,
    Path((ean, image_id)): Path<(String, i64)>,
) -> ApiResult<Json<ImageActionResponse>> {
    let ean = normalize_ean(&ean)?;
    state.images.delete(&ean, image_id).await?;

    Ok(Json(ImageActionResponse {
        success: true,
        message: "Image deleted".to_string(),
    }))
}

/// Build image routes; request bodies may carry one file of at most
/// `max_file_bytes`
pub fn upload_routes(max_file_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/upload/:ean",
            get(list_images)
                .post(upload_image)
                .layer(DefaultBodyLimit::max(max_file_bytes + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/api/upload/:ean/primary/:image_id", put(set_primary_image))
        .route("/api/upload/:ean/:image_id", delete(delete_image))
}
