//! Stock batch models

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnitKind;
use crate::expiry::{classify, ExpiryClassification, ExpiryStatus};

/// A discrete stock intake with its own shelf life.
///
/// Batches are created one per stock increase, never merged and never
/// deleted. A batch with `remaining_qty == 0` is exhausted and no longer
/// counts toward the product's stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: i64,
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    #[serde(rename = "qty")]
    pub original_qty: Decimal,
    #[serde(rename = "qtyTersisa")]
    pub remaining_qty: Decimal,
    #[serde(rename = "tanggalRestok")]
    pub restocked_at: DateTime<Utc>,
    #[serde(rename = "masaSimpanHari")]
    pub shelf_life_days: i32,
    #[serde(rename = "tanggalKadaluarsa")]
    pub expires_at: DateTime<Utc>,
    pub supplier: Option<String>,
    #[serde(rename = "keterangan")]
    pub note: Option<String>,
}

impl Batch {
    /// Expiry timestamp of a batch restocked at `restocked_at`, `None` when
    /// it falls outside the representable calendar
    pub fn expiry_for(restocked_at: DateTime<Utc>, shelf_life_days: i32) -> Option<DateTime<Utc>> {
        restocked_at.checked_add_signed(Duration::days(i64::from(shelf_life_days)))
    }

    pub fn is_active(&self) -> bool {
        self.remaining_qty > Decimal::ZERO
    }

    pub fn classify(&self, now: DateTime<Utc>, lead_days: i32) -> ExpiryClassification {
        classify(self.expires_at, now, lead_days)
    }
}

/// FIFO ordering: earliest expiry first, then creation order
pub fn fifo_order(a: &Batch, b: &Batch) -> std::cmp::Ordering {
    a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id))
}

/// A batch labelled with its expiry status, for operator inspection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub status: ExpiryStatus,
    #[serde(rename = "sisaHari")]
    pub remaining_days: i64,
}

impl BatchView {
    pub fn new(batch: Batch, now: DateTime<Utc>, lead_days: i32) -> Self {
        let ExpiryClassification {
            remaining_days,
            status,
        } = batch.classify(now, lead_days);
        Self {
            batch,
            status,
            remaining_days,
        }
    }
}

/// An active batch joined with the product metadata the expiry screens show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpiringBatch {
    #[serde(flatten)]
    pub batch: BatchView,
    #[serde(rename = "namaProduk")]
    pub product_name: String,
    pub barcode: String,
    #[serde(rename = "kategori")]
    pub category: Option<String>,
    #[serde(rename = "tipeProduk")]
    pub unit_kind: UnitKind,
    /// Purchase value of the remaining quantity; `None` when it overflows
    #[serde(rename = "nilaiSisa")]
    pub remaining_value: Option<Decimal>,
}
