//! WebAssembly module for the fresh-produce point of sale
//!
//! Provides client-side computation for:
//! - Expiry labelling of batches on the shelf screen
//! - FIFO draw previews before a sale is submitted
//! - Loss value previews on the write-off form
//! - Offline input validation

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::allocation::{loss_value, plan_consumption};
use shared::expiry::classify;
use shared::validation::{parse_change_kind, validate_barcode, validate_quantity};
use shared::{Batch, UnitKind};
use wasm_bindgen::prelude::*;

fn js_error(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("Invalid {}: {}", field, e))
}

#[derive(Serialize)]
struct ExpiryLabel {
    #[serde(rename = "sisaHari")]
    remaining_days: i64,
    status: &'static str,
}

fn expiry_label(expires_at: &str, now: DateTime<Utc>, lead_days: i32) -> Result<String, String> {
    let expires_at = parse_timestamp("tanggalKadaluarsa", expires_at)?;
    let result = classify(expires_at, now, lead_days);
    serde_json::to_string(&ExpiryLabel {
        remaining_days: result.remaining_days,
        status: result.status.as_str(),
    })
    .map_err(|e| e.to_string())
}

/// Label a batch expiring at `expires_at` (RFC 3339) as of `now` (RFC 3339).
/// Returns `{"sisaHari": n, "status": "..."}`.
#[wasm_bindgen]
pub fn classify_expiry(expires_at: &str, now: &str, lead_days: i32) -> Result<String, JsValue> {
    let now = parse_timestamp("now", now).map_err(js_error)?;
    expiry_label(expires_at, now, lead_days).map_err(js_error)
}

/// Same as [`classify_expiry`], using the browser clock
#[wasm_bindgen]
pub fn classify_expiry_now(expires_at: &str, lead_days: i32) -> Result<String, JsValue> {
    let now = Utc
        .timestamp_millis_opt(js_sys::Date::now() as i64)
        .single()
        .ok_or_else(|| js_error("Browser clock out of range".to_string()))?;
    expiry_label(expires_at, now, lead_days).map_err(js_error)
}

fn loss_preview(purchase_price: &str, delta: &str) -> Result<String, String> {
    let price = parse_decimal("hargaBeli", purchase_price)?;
    let delta = parse_decimal("perubahan", delta)?;
    loss_value(price, delta)
        .map(|value| value.to_string())
        .map_err(|e| e.to_string())
}

/// Loss value the server will record for writing off `delta` units
#[wasm_bindgen]
pub fn preview_loss_value(purchase_price: &str, delta: &str) -> Result<String, JsValue> {
    loss_preview(purchase_price, delta).map_err(js_error)
}

fn sale_preview(batches_json: &str, quantity: &str) -> Result<String, String> {
    let batches: Vec<Batch> =
        serde_json::from_str(batches_json).map_err(|e| format!("Invalid batches JSON: {}", e))?;
    let quantity = parse_decimal("qty", quantity)?;
    let draws = plan_consumption(&batches, quantity).map_err(|e| e.to_string())?;
    serde_json::to_string(&draws).map_err(|e| e.to_string())
}

/// Preview which batches a sale of `quantity` draws from, earliest expiry
/// first. `batches_json` is the product's batch list as served by the API.
#[wasm_bindgen]
pub fn preview_sale_draws(batches_json: &str, quantity: &str) -> Result<String, JsValue> {
    sale_preview(batches_json, quantity).map_err(js_error)
}

/// Whether `quantity` is valid for a product of `unit_kind` (`bulk` or `fixed`)
#[wasm_bindgen]
pub fn is_valid_quantity(unit_kind: &str, quantity: &str) -> bool {
    let Some(unit_kind) = UnitKind::parse(unit_kind) else {
        return false;
    };
    parse_decimal("qty", quantity)
        .map(|qty| validate_quantity(unit_kind, qty).is_ok())
        .unwrap_or(false)
}

#[wasm_bindgen]
pub fn is_valid_barcode(barcode: &str) -> bool {
    validate_barcode(barcode).is_ok()
}

/// Whether a change kind may be used for the given direction
#[wasm_bindgen]
pub fn change_kind_allows(kind: &str, increase: bool) -> bool {
    match parse_change_kind(kind) {
        Ok(kind) if increase => kind.allows_increase(),
        Ok(kind) => kind.allows_decrease(),
        Err(_) => false,
    }
}
