//! Shared fixtures for the inventory integration tests
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use fpi_backend::config::InventoryConfig;
use fpi_backend::services::inventory::{DecreaseStockInput, IncreaseStockInput};
use fpi_backend::services::{InventoryService, ManualClock};
use fpi_backend::store::{MemoryStore, StockChangeOutcome};
use rust_decimal::Decimal;
use shared::{CreateProductInput, LossCategory, Product, UnitKind};
use uuid::Uuid;

pub type Service = InventoryService<MemoryStore>;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Day zero of every scenario, 08:00 UTC
pub fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub struct Harness {
    pub service: Service,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(day0()));
    let service = InventoryService::with_clock(
        MemoryStore::default(),
        InventoryConfig::default(),
        clock.clone(),
    );
    Harness { service, clock }
}

pub fn product_input(barcode: &str, unit_kind: UnitKind) -> CreateProductInput {
    CreateProductInput {
        barcode: barcode.to_string(),
        name: format!("Produk {}", barcode),
        category: Some("Sayur".to_string()),
        unit_kind,
        purchase_price: dec("5000"),
        sale_price: dec("7500"),
        default_shelf_life_days: None,
        warning_lead_days: None,
        low_stock_threshold: None,
    }
}

pub async fn new_product(service: &Service, barcode: &str) -> Product {
    service
        .create_product(product_input(barcode, UnitKind::Bulk))
        .await
        .unwrap()
}

pub fn restock(product_id: Uuid, qty: &str, shelf_life_days: i32) -> IncreaseStockInput {
    IncreaseStockInput {
        product_id,
        delta: dec(qty),
        change_kind: None,
        note: None,
        supplier: Some("Pasar Induk".to_string()),
        shelf_life_days: Some(shelf_life_days),
    }
}

pub fn sale(product_id: Uuid, qty: &str) -> DecreaseStockInput {
    DecreaseStockInput {
        product_id,
        delta: -dec(qty),
        change_kind: None,
        note: None,
        loss_category: None,
        claimed_loss_value: None,
    }
}

pub fn write_off(product_id: Uuid, qty: &str, category: LossCategory) -> DecreaseStockInput {
    DecreaseStockInput {
        loss_category: Some(category),
        ..sale(product_id, qty)
    }
}

pub async fn receive(
    service: &Service,
    product_id: Uuid,
    qty: &str,
    shelf_life_days: i32,
) -> StockChangeOutcome {
    service
        .increase_stock(restock(product_id, qty, shelf_life_days))
        .await
        .unwrap()
}
