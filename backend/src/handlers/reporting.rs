//! Reporting handlers for expiry, low stock, losses and audit

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{ExpiringBatch, Product, TimeRange};

use crate::error::AppResult;
use crate::services::export_to_csv;
use crate::services::inventory::AuditReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    #[serde(rename = "withinDays")]
    pub within_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LossReportQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub format: Option<String>,
}

/// Active batches expiring soon
pub async fn list_expiring_batches(
    State(state): State<AppState>,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<ExpiringBatch>>> {
    let batches = state
        .inventory
        .list_expiring_batches(query.within_days)
        .await?;
    Ok(Json(batches))
}

/// Active batches past expiry, awaiting write-off
pub async fn list_expired_batches(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ExpiringBatch>>> {
    let batches = state.inventory.list_expired_batches().await?;
    Ok(Json(batches))
}

/// Products at or below their minimum stock
pub async fn list_low_stock(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let products = state.inventory.list_low_stock().await?;
    Ok(Json(products))
}

/// Loss totals by category
pub async fn get_loss_report(
    State(state): State<AppState>,
    Query(query): Query<LossReportQuery>,
) -> AppResult<Response> {
    let data = state
        .inventory
        .loss_summary(TimeRange::new(query.from, query.to))
        .await?;

    if query.format.as_deref() == Some("csv") {
        let csv = export_to_csv(&data)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"loss_report.csv\"",
                ),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(data).into_response())
}

/// Check stock against batches and ledger for every product
pub async fn run_audit(State(state): State<AppState>) -> AppResult<Json<AuditReport>> {
    let report = state.inventory.audit().await?;
    Ok(Json(report))
}
