//! HTTP handlers for directional stock changes

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::inventory::{DecreaseStockInput, IncreaseStockInput, SetStockInput};
use crate::store::StockChangeOutcome;
use crate::AppState;

/// Receive stock as a new batch
pub async fn increase_stock(
    State(state): State<AppState>,
    Json(input): Json<IncreaseStockInput>,
) -> AppResult<Json<StockChangeOutcome>> {
    let outcome = state.inventory.increase_stock(input).await?;
    Ok(Json(outcome))
}

/// Sell or write off stock, earliest expiry first
pub async fn decrease_stock(
    State(state): State<AppState>,
    Json(input): Json<DecreaseStockInput>,
) -> AppResult<Json<StockChangeOutcome>> {
    let outcome = state.inventory.decrease_stock(input).await?;
    Ok(Json(outcome))
}

/// Set stock to a counted quantity
pub async fn set_stock(
    State(state): State<AppState>,
    Json(input): Json<SetStockInput>,
) -> AppResult<Json<StockChangeOutcome>> {
    let outcome = state.inventory.set_stock(input).await?;
    Ok(Json(outcome))
}
