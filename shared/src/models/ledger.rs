//! Stock ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable record of one stock change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLedgerEntry {
    pub id: i64,
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    #[serde(rename = "stokSebelum")]
    pub stock_before: Decimal,
    #[serde(rename = "stokSesudah")]
    pub stock_after: Decimal,
    /// Signed change, always `stock_after - stock_before`
    #[serde(rename = "perubahan")]
    pub delta: Decimal,
    #[serde(rename = "jenisPerubahan")]
    pub change_kind: ChangeKind,
    #[serde(rename = "keterangan")]
    pub note: Option<String>,
    #[serde(rename = "tipeKerugian")]
    pub loss_category: Option<LossCategory>,
    #[serde(rename = "nilaiKerugian")]
    pub loss_value: Option<Decimal>,
    /// Batch created by an increase
    #[serde(rename = "batchId")]
    pub batch_id: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Why stock changed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Manual,
    Purchase,
    Sale,
    Adjustment,
    Return,
    WriteOff,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Manual => "manual",
            ChangeKind::Purchase => "purchase",
            ChangeKind::Sale => "sale",
            ChangeKind::Adjustment => "adjustment",
            ChangeKind::Return => "return",
            ChangeKind::WriteOff => "write_off",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(ChangeKind::Manual),
            "purchase" => Some(ChangeKind::Purchase),
            "sale" => Some(ChangeKind::Sale),
            "adjustment" => Some(ChangeKind::Adjustment),
            "return" => Some(ChangeKind::Return),
            "write_off" => Some(ChangeKind::WriteOff),
            _ => None,
        }
    }

    /// Whether this kind may record an increase in stock
    pub fn allows_increase(&self) -> bool {
        !matches!(self, ChangeKind::Sale | ChangeKind::WriteOff)
    }

    /// Whether this kind may record a decrease in stock
    pub fn allows_decrease(&self) -> bool {
        !matches!(self, ChangeKind::Purchase)
    }
}

/// Shrinkage classification for loss-attributed decreases
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LossCategory {
    Damaged,
    Lost,
    Expired,
    Other,
}

impl LossCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossCategory::Damaged => "damaged",
            LossCategory::Lost => "lost",
            LossCategory::Expired => "expired",
            LossCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "damaged" => Some(LossCategory::Damaged),
            "lost" => Some(LossCategory::Lost),
            "expired" => Some(LossCategory::Expired),
            "other" => Some(LossCategory::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for LossCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Loss totals for one category over a reporting window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LossSummary {
    #[serde(rename = "tipeKerugian")]
    pub loss_category: LossCategory,
    pub entry_count: i64,
    pub total_quantity: Decimal,
    #[serde(rename = "totalNilaiKerugian")]
    pub total_value: Decimal,
}

/// Per-product result of the ledger/batch consistency audit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    pub stock: Decimal,
    pub batch_total: Decimal,
    /// `None` when the product has no ledger entries
    pub ledger_total: Option<Decimal>,
    pub consistent: bool,
}
