//! HTTP handlers for the product catalog and per-product stock

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared::{BatchView, CreateProductInput, Product, UpdateProductInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::export_to_csv;
use crate::services::inventory::{StockLevel, StockUpdateInput};
use crate::store::StockChangeOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>, // "json" or "csv"
}

/// List all products
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let products = state.inventory.list_products().await?;
    Ok(Json(products))
}

/// Register a product
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = state.inventory.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let product = state.inventory.get_product(product_id).await?;
    Ok(Json(product))
}

/// Update product metadata
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let product = state.inventory.update_product(product_id, input).await?;
    Ok(Json(product))
}

/// Get current stock for a product
pub async fn get_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<StockLevel>> {
    let level = state.inventory.get_stock(product_id).await?;
    Ok(Json(level))
}

/// Apply a delta or absolute stock update to a product
pub async fn update_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<StockUpdateInput>,
) -> AppResult<Json<StockChangeOutcome>> {
    let outcome = state.inventory.update_stock(product_id, input).await?;
    Ok(Json(outcome))
}

/// List every batch of a product with its expiry status
pub async fn list_batches(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<BatchView>>> {
    let batches = state.inventory.list_batches_for_product(product_id).await?;
    Ok(Json(batches))
}

/// Stock history for a product, newest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    let entries = state.inventory.get_history(product_id).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = export_to_csv(&entries)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"stock_history.csv\"",
                ),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(entries).into_response())
}
