//! Resolution API handlers
//!
//! POST /api/scraper/{ean,box,table}[/async], GET /api/scraper/task/:task_id,
//! GET /api/scraper/products[/:ean]

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    models::{normalize_ean, ProductRecord, TaskKind, TaskRecord, TaskStatus},
    services::parse_table,
    AppState,
};
use eanscout_common::Error;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// POST /api/scraper/ean request
#[derive(Debug, Deserialize)]
pub struct EanRequest {
    pub ean: String,
    #[serde(default)]
    pub brand: Option<String>,
}

/// POST /api/scraper/box request
#[derive(Debug, Deserialize)]
pub struct BoxDataRequest {
    pub box_data: String,
}

/// POST /api/scraper/table request
#[derive(Debug, Deserialize)]
pub struct TableDataRequest {
    pub csv_data: String,
}

/// Task snapshot returned by submissions and polling
#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub results: Option<Vec<ProductRecord>>,
}

impl From<TaskRecord> for TaskStatusResponse {
    fn from(task: TaskRecord) -> Self {
        Self {
            task_id: task.task_id,
            status: task.status,
            message: task.message,
            results: task.results,
        }
    }
}

/// GET /api/scraper/products query
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub brand: Option<String>,
}

/// POST /api/scraper/ean
///
/// Resolve one EAN inline; blocks until every adapter had its turn.
pub async fn resolve_ean(
    State(state): State<AppState>,
    Json(request): Json<EanRequest>,
) -> ApiResult<Json<ProductRecord>> {
    let record = state
        .pipeline
        .resolve(&request.ean, request.brand.as_deref(), None)
        .await?;

    Ok(Json(record))
}

/// POST /api/scraper/ean/async
///
/// The EAN is validated before a task is created.
pub async fn resolve_ean_async(
    State(state): State<AppState>,
    Json(request): Json<EanRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let ean = normalize_ean(&request.ean)?;
    let task = state
        .tasks
        .submit(TaskKind::Ean {
            ean,
            brand: request.brand,
        })
        .await;

    Ok(Json(task.into()))
}

/// POST /api/scraper/box
pub async fn resolve_box(
    State(state): State<AppState>,
    Json(request): Json<BoxDataRequest>,
) -> ApiResult<Json<Vec<ProductRecord>>> {
    require_text(&request.box_data, "box_data")?;
    let results = state.pipeline.resolve_boxes(&request.box_data).await;

    tracing::info!(results = results.len(), "Box text resolved");
    Ok(Json(results))
}

/// POST /api/scraper/box/async
pub async fn resolve_box_async(
    State(state): State<AppState>,
    Json(request): Json<BoxDataRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    require_text(&request.box_data, "box_data")?;
    let task = state
        .tasks
        .submit(TaskKind::Box {
            box_data: request.box_data,
        })
        .await;

    Ok(Json(task.into()))
}

/// POST /api/scraper/table
pub async fn resolve_table(
    State(state): State<AppState>,
    Json(request): Json<TableDataRequest>,
) -> ApiResult<Json<Vec<ProductRecord>>> {
    require_text(&request.csv_data, "csv_data")?;
    let results = state.pipeline.resolve_table(&request.csv_data).await?;

    tracing::info!(results = results.len(), "CSV table resolved");
    Ok(Json(results))
}

/// POST /api/scraper/table/async
///
/// Header problems are reported now rather than as a failed task.
pub async fn resolve_table_async(
    State(state): State<AppState>,
    Json(request): Json<TableDataRequest>,
) -> ApiResult<Json<TaskStatusResponse>> {
    require_text(&request.csv_data, "csv_data")?;
    parse_table(&request.csv_data)?;

    let task = state
        .tasks
        .submit(TaskKind::Table {
            csv_data: request.csv_data,
        })
        .await;

    Ok(Json(task.into()))
}

/// GET /api/scraper/task/:task_id
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusResponse>> {
    let task = state.tasks.get_status(&task_id).await?;
    Ok(Json(task.into()))
}

/// GET /api/scraper/products/:ean
pub async fn get_product(
    State(state): State<AppState>,
    Path(ean): Path<String>,
) -> ApiResult<Json<ProductRecord>> {
    let ean = normalize_ean(&ean)?;
    let product = state
        .store
        .get_by_ean(&ean)
        .await?
        .ok_or(Error::ProductNotFound(ean))?;

    Ok(Json(product))
}

/// GET /api/scraper/products?limit=50&offset=0&brand=
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Vec<ProductRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let brand = query
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    let products = state.store.list(limit, offset, brand).await?;
    Ok(Json(products))
}

fn require_text(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Build resolution routes
pub fn scraper_routes() -> Router<AppState> {
    Router::new()
        .route("/api/scraper/ean", post(resolve_ean))
        .route("/api/scraper/ean/async", post(resolve_ean_async))
        .route("/api/scraper/box", post(resolve_box))
        .route("/api/scraper/box/async", post(resolve_box_async))
        .route("/api/scraper/table", post(resolve_table))
        .route("/api/scraper/table/async", post(resolve_table_async))
        .route("/api/scraper/task/:task_id", get(get_task_status))
        .route("/api/scraper/products", get(list_products))
        .route("/api/scraper/products/:ean", get(get_product))
}
