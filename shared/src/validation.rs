//! Validation utilities for stock requests and product registration
//!
//! These run before any store is touched; the allocation engine repeats the
//! checks that depend on current stock.

use rust_decimal::Decimal;

use crate::models::{ChangeKind, UnitKind};

/// Longest shelf life a batch may be given
pub const MAX_SHELF_LIFE_DAYS: i32 = 3650;

/// Largest price storable as `NUMERIC(14, 2)`
pub const MAX_PRICE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Largest quantity storable as `NUMERIC(14, 3)`
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 3);

// ============================================================================
// Stock request validations
// ============================================================================

/// Validate the sign of a stock delta for the endpoint it arrived on
pub fn validate_delta_sign(delta: Decimal, increase: bool) -> Result<(), &'static str> {
    if delta.is_zero() {
        return Err("Stock change must be non-zero");
    }
    if increase && delta < Decimal::ZERO {
        return Err("Stock increase must be positive");
    }
    if !increase && delta > Decimal::ZERO {
        return Err("Stock decrease must be negative");
    }
    Ok(())
}

/// Validate shelf life is a positive number of days within ten years
pub fn validate_shelf_life(days: i32) -> Result<(), &'static str> {
    if days <= 0 {
        return Err("Shelf life must be at least one day");
    }
    if days > MAX_SHELF_LIFE_DAYS {
        return Err("Shelf life cannot exceed 3650 days");
    }
    Ok(())
}

/// Validate a quantity is expressible in the product's unit
pub fn validate_quantity(unit_kind: UnitKind, quantity: Decimal) -> Result<(), &'static str> {
    if !unit_kind.accepts(quantity) {
        return match unit_kind {
            UnitKind::Fixed => Err("Fixed-unit products only accept whole quantities"),
            UnitKind::Bulk => Err("Weighed quantities allow at most three decimal places"),
        };
    }
    Ok(())
}

/// Validate a quantity's magnitude fits the stored precision
pub fn validate_quantity_range(quantity: Decimal) -> Result<(), &'static str> {
    if quantity.abs() > MAX_QUANTITY {
        return Err("Quantity exceeds the largest storable amount");
    }
    Ok(())
}

/// Parse a caller-supplied change kind
pub fn parse_change_kind(kind: &str) -> Result<ChangeKind, &'static str> {
    ChangeKind::parse(kind).ok_or("Unknown change kind")
}

// ============================================================================
// Product validations
// ============================================================================

/// Validate purchase and sale prices
pub fn validate_prices(purchase: Decimal, sale: Decimal) -> Result<(), &'static str> {
    if purchase < Decimal::ZERO || sale < Decimal::ZERO {
        return Err("Prices cannot be negative");
    }
    if purchase > MAX_PRICE || sale > MAX_PRICE {
        return Err("Price exceeds the largest storable amount");
    }
    Ok(())
}

/// Validate barcode format (EAN-8/EAN-13/UPC digits, or an internal
/// alphanumeric SKU)
pub fn validate_barcode(barcode: &str) -> Result<(), &'static str> {
    if barcode.trim().is_empty() {
        return Err("Barcode is required");
    }
    if !barcode.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err("Barcode may only contain letters, digits and dashes");
    }
    if barcode.chars().all(|c| c.is_ascii_digit())
        && matches!(barcode.len(), 8 | 13)
        && !ean_checksum_ok(barcode)
    {
        return Err("Invalid EAN checksum");
    }
    Ok(())
}

fn ean_checksum_ok(digits: &str) -> bool {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    let Some((check, body)) = values.split_last() else {
        return false;
    };
    // Weights alternate 3,1 from the rightmost body digit
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10 == *check
}
