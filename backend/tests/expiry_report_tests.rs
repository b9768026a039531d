//! Expiry and reporting tests
//!
//! - Expiring and expired batch reports as the clock moves
//! - Per-product batch labelling
//! - Low-stock report
//! - Loss summary by category and time window

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::*;
use fpi_backend::config::InventoryConfig;
use fpi_backend::error::AppError;
use fpi_backend::services::{InventoryService, ManualClock};
use fpi_backend::store::MemoryStore;
use shared::{ExpiryStatus, LossCategory, TimeRange, UnitKind};

#[tokio::test]
async fn test_expiring_report_moves_with_the_clock() {
    let h = harness();
    let product = new_product(&h.service, "SAYUR-001").await;
    let batch = receive(&h.service, product.id, "100", 7)
        .await
        .created_batch
        .unwrap();

    h.clock.advance_days(6);
    let expiring = h.service.list_expiring_batches(Some(7)).await.unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].batch.batch.id, batch.id);
    assert_eq!(expiring[0].batch.status, ExpiryStatus::NearingExpiry);
    assert_eq!(expiring[0].batch.remaining_days, 1);
    assert_eq!(expiring[0].product_name, product.name);
    assert_eq!(expiring[0].remaining_value, Some(dec("500000")));

    h.clock.advance_days(2);
    assert!(h.service.list_expiring_batches(Some(7)).await.unwrap().is_empty());

    let expired = h.service.list_expired_batches().await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].batch.status, ExpiryStatus::Expired);
    assert_eq!(expired[0].batch.remaining_days, -1);
}

#[tokio::test]
async fn test_expiring_report_sorted_and_windowed() {
    let h = harness();
    let a = new_product(&h.service, "SAYUR-001").await;
    let b = new_product(&h.service, "BUAH-001").await;

    let b_soon = receive(&h.service, b.id, "5", 2).await.created_batch.unwrap();
    let a_later = receive(&h.service, a.id, "5", 6).await.created_batch.unwrap();
    let a_soon = receive(&h.service, a.id, "5", 2).await.created_batch.unwrap();
    receive(&h.service, a.id, "5", 20).await;

    let expiring = h.service.list_expiring_batches(Some(7)).await.unwrap();
    let ids: Vec<i64> = expiring.iter().map(|e| e.batch.batch.id).collect();
    assert_eq!(ids, vec![b_soon.id, a_soon.id, a_later.id]);

    // Default window comes from configuration (7 days)
    assert_eq!(h.service.list_expiring_batches(None).await.unwrap().len(), 3);
    assert_eq!(h.service.list_expiring_batches(Some(2)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_exhausted_batches_leave_reports() {
    let h = harness();
    let product = new_product(&h.service, "SAYUR-001").await;
    receive(&h.service, product.id, "10", 3).await;

    h.service.decrease_stock(sale(product.id, "10")).await.unwrap();

    assert!(h.service.list_expiring_batches(Some(7)).await.unwrap().is_empty());
    h.clock.advance_days(10);
    assert!(h.service.list_expired_batches().await.unwrap().is_empty());

    // Still listed, labelled, on the product's own batch screen
    let batches = h.service.list_batches_for_product(product.id).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].status, ExpiryStatus::Expired);
}

#[tokio::test]
async fn test_negative_window_is_rejected() {
    let h = harness();
    let err = h.service.list_expiring_batches(Some(-1)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_product_lead_time_drives_labels() {
    let h = harness();
    let mut input = product_input("DAGING-01", UnitKind::Bulk);
    input.warning_lead_days = Some(2);
    let product = h.service.create_product(input).await.unwrap();

    receive(&h.service, product.id, "3", 5).await;
    receive(&h.service, product.id, "3", 2).await;

    let batches = h.service.list_batches_for_product(product.id).await.unwrap();
    assert_eq!(batches[0].status, ExpiryStatus::Fresh);
    assert_eq!(batches[1].status, ExpiryStatus::NearingExpiry);
}

#[tokio::test]
async fn test_configured_default_lead_time() {
    let clock = Arc::new(ManualClock::new(day0()));
    let settings = InventoryConfig {
        default_warning_days: 3,
        ..InventoryConfig::default()
    };
    let service = InventoryService::with_clock(MemoryStore::default(), settings, clock);
    let product = new_product(&service, "SAYUR-001").await;

    receive(&service, product.id, "3", 10).await;
    receive(&service, product.id, "3", 3).await;

    let batches = service.list_batches_for_product(product.id).await.unwrap();
    assert_eq!(batches[0].status, ExpiryStatus::Fresh);
    assert_eq!(batches[1].status, ExpiryStatus::NearingExpiry);
}

#[tokio::test]
async fn test_low_stock_report() {
    let h = harness();
    let mut input = product_input("SAYUR-001", UnitKind::Bulk);
    input.low_stock_threshold = Some(dec("10"));
    let watched = h.service.create_product(input).await.unwrap();
    let unwatched = new_product(&h.service, "SAYUR-002").await;

    receive(&h.service, watched.id, "25", 7).await;
    assert!(h.service.list_low_stock().await.unwrap().is_empty());

    h.service.decrease_stock(sale(watched.id, "15")).await.unwrap();
    let low = h.service.list_low_stock().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, watched.id);
    assert!(h.service.get_stock(watched.id).await.unwrap().low_stock);
    assert!(!h.service.get_stock(unwatched.id).await.unwrap().low_stock);
}

#[tokio::test]
async fn test_loss_summary_groups_by_category() {
    let h = harness();
    let product = new_product(&h.service, "SAYUR-001").await;
    receive(&h.service, product.id, "100", 7).await;

    h.service
        .decrease_stock(write_off(product.id, "10", LossCategory::Damaged))
        .await
        .unwrap();
    h.service
        .decrease_stock(write_off(product.id, "2", LossCategory::Damaged))
        .await
        .unwrap();
    h.service
        .decrease_stock(write_off(product.id, "1.5", LossCategory::Expired))
        .await
        .unwrap();
    h.service.decrease_stock(sale(product.id, "20")).await.unwrap();

    let summary = h.service.loss_summary(TimeRange::default()).await.unwrap();
    assert_eq!(summary.len(), 2);

    assert_eq!(summary[0].loss_category, LossCategory::Damaged);
    assert_eq!(summary[0].entry_count, 2);
    assert_eq!(summary[0].total_quantity, dec("12"));
    assert_eq!(summary[0].total_value, dec("60000"));

    assert_eq!(summary[1].loss_category, LossCategory::Expired);
    assert_eq!(summary[1].total_quantity, dec("1.5"));
    assert_eq!(summary[1].total_value, dec("7500"));
}

#[tokio::test]
async fn test_loss_summary_respects_window() {
    let h = harness();
    let product = new_product(&h.service, "SAYUR-001").await;
    receive(&h.service, product.id, "100", 30).await;

    h.service
        .decrease_stock(write_off(product.id, "1", LossCategory::Lost))
        .await
        .unwrap();
    h.clock.advance_days(10);
    h.service
        .decrease_stock(write_off(product.id, "3", LossCategory::Lost))
        .await
        .unwrap();

    let window = TimeRange::new(Some(day0() + Duration::days(5)), None);
    let summary = h.service.loss_summary(window).await.unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].entry_count, 1);
    assert_eq!(summary[0].total_quantity, dec("3"));

    let inverted = TimeRange::new(Some(day0() + Duration::days(5)), Some(day0()));
    let err = h.service.loss_summary(inverted).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}
