//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Warning lead time applied when a product has none configured
pub const DEFAULT_WARNING_LEAD_DAYS: i32 = 30;

/// A product in the store catalog together with its aggregate stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    /// SKU or barcode printed on the shelf label
    pub barcode: String,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "kategori")]
    pub category: Option<String>,
    #[serde(rename = "tipeProduk")]
    pub unit_kind: UnitKind,
    #[serde(rename = "hargaBeli")]
    pub purchase_price: Decimal,
    #[serde(rename = "hargaJual")]
    pub sale_price: Decimal,
    /// Sum of remaining quantity over the product's active batches.
    /// Only the allocation engine writes this value.
    #[serde(rename = "stok")]
    pub stock: Decimal,
    #[serde(rename = "masaSimpanDefault")]
    pub default_shelf_life_days: Option<i32>,
    #[serde(rename = "batasNotifikasiHari")]
    pub warning_lead_days: Option<i32>,
    #[serde(rename = "stokMinimum")]
    pub low_stock_threshold: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Days before expiry at which a batch of this product is flagged
    pub fn warning_lead_days(&self) -> i32 {
        self.warning_lead_days.unwrap_or(DEFAULT_WARNING_LEAD_DAYS)
    }

    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold
            .map(|threshold| self.stock <= threshold)
            .unwrap_or(false)
    }
}

/// Finest quantity resolution stored for weighed goods (grams, for kg)
pub const QUANTITY_SCALE: u32 = 3;

/// How a product is measured at the till
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Weighed goods, sold in fractional quantities (kg)
    Bulk,
    /// Counted goods, sold in whole units
    Fixed,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Bulk => "bulk",
            UnitKind::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bulk" => Some(UnitKind::Bulk),
            "fixed" => Some(UnitKind::Fixed),
            _ => None,
        }
    }

    /// Whether `quantity` is expressible in this unit
    pub fn accepts(&self, quantity: Decimal) -> bool {
        match self {
            UnitKind::Bulk => quantity.normalize().scale() <= QUANTITY_SCALE,
            UnitKind::Fixed => quantity.fract().is_zero(),
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitKind::Bulk => write!(f, "Bulk"),
            UnitKind::Fixed => write!(f, "Fixed"),
        }
    }
}

/// Input for registering a product. New products start with zero stock.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 64))]
    pub barcode: String,
    #[serde(rename = "nama")]
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "kategori")]
    pub category: Option<String>,
    #[serde(rename = "tipeProduk")]
    pub unit_kind: UnitKind,
    #[serde(rename = "hargaBeli")]
    pub purchase_price: Decimal,
    #[serde(rename = "hargaJual")]
    pub sale_price: Decimal,
    #[serde(rename = "masaSimpanDefault")]
    #[validate(range(min = 1, max = 3650))]
    pub default_shelf_life_days: Option<i32>,
    #[serde(rename = "batasNotifikasiHari")]
    #[validate(range(min = 0, max = 3650))]
    pub warning_lead_days: Option<i32>,
    #[serde(rename = "stokMinimum")]
    pub low_stock_threshold: Option<Decimal>,
}

/// Input for updating product metadata. Stock only changes through stock requests.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    #[serde(rename = "nama")]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(rename = "kategori")]
    pub category: Option<String>,
    #[serde(rename = "hargaBeli")]
    pub purchase_price: Option<Decimal>,
    #[serde(rename = "hargaJual")]
    pub sale_price: Option<Decimal>,
    #[serde(rename = "masaSimpanDefault")]
    #[validate(range(min = 1, max = 3650))]
    pub default_shelf_life_days: Option<i32>,
    #[serde(rename = "batasNotifikasiHari")]
    #[validate(range(min = 0, max = 3650))]
    pub warning_lead_days: Option<i32>,
    #[serde(rename = "stokMinimum")]
    pub low_stock_threshold: Option<Decimal>,
}

impl UpdateProductInput {
    /// Apply the provided fields onto `product`
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(category) = &self.category {
            product.category = Some(category.clone());
        }
        if let Some(price) = self.purchase_price {
            product.purchase_price = price;
        }
        if let Some(price) = self.sale_price {
            product.sale_price = price;
        }
        if let Some(days) = self.default_shelf_life_days {
            product.default_shelf_life_days = Some(days);
        }
        if let Some(days) = self.warning_lead_days {
            product.warning_lead_days = Some(days);
        }
        if let Some(threshold) = self.low_stock_threshold {
            product.low_stock_threshold = Some(threshold);
        }
        product.updated_at = now;
    }
}
