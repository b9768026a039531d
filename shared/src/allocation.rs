//! Allocation engine
//!
//! Plans how a stock request changes a product's batches and which ledger
//! entry records it. Planning is pure: storage backends load the product and
//! its active batches under the product lock, call [`plan_stock_change`],
//! and persist the resulting [`AllocationPlan`] in the same critical section.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{fifo_order, Batch, ChangeKind, LossCategory, Product, UnitKind};
use crate::validation::{validate_quantity_range, validate_shelf_life};

/// A requested stock change, normalized at the service boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockRequest {
    /// Move stock to an absolute quantity
    SetAbsolute(Decimal),
    /// Change stock by a signed quantity
    AdjustBy(Decimal),
}

impl StockRequest {
    /// Signed delta this request represents against `current` stock
    pub fn delta_against(&self, current: Decimal) -> Decimal {
        match *self {
            StockRequest::SetAbsolute(target) => target - current,
            StockRequest::AdjustBy(delta) => delta,
        }
    }
}

/// Caller-provided context attached to a stock change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockChangeOptions {
    pub change_kind: Option<ChangeKind>,
    pub note: Option<String>,
    pub supplier: Option<String>,
    pub shelf_life_days: Option<i32>,
    pub loss_category: Option<LossCategory>,
    /// Loss value computed by the caller. Recorded only for comparison; the
    /// engine's own value is what gets stored.
    pub claimed_loss_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("Stock change must be non-zero")]
    InvalidDelta,

    #[error("Shelf life is required when increasing stock")]
    MissingShelfLife,

    #[error("Shelf life must be between 1 and 3650 days, got {0}")]
    InvalidShelfLife(i32),

    #[error("Quantity {0} exceeds the largest storable amount")]
    QuantityOutOfRange(Decimal),

    #[error("Value exceeds the representable range")]
    ValueOverflow,

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Quantity {quantity} is not valid for {unit_kind} products")]
    InvalidQuantity {
        unit_kind: UnitKind,
        quantity: Decimal,
    },

    #[error("Change kind {0} cannot increase stock")]
    KindCannotIncrease(&'static str),

    #[error("Change kind {0} cannot decrease stock")]
    KindCannotDecrease(&'static str),

    #[error("A loss category is required for write-offs")]
    MissingLossCategory,

    #[error("A loss category only applies to stock decreases")]
    UnexpectedLossCategory,
}

/// Quantity taken from one batch by a decrease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    #[serde(rename = "batchId")]
    pub batch_id: i64,
    #[serde(rename = "qty")]
    pub quantity: Decimal,
    #[serde(rename = "qtyTersisa")]
    pub remaining_after: Decimal,
}

/// A batch to be created by an increase; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBatch {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub restocked_at: DateTime<Utc>,
    pub shelf_life_days: i32,
    pub expires_at: DateTime<Utc>,
    pub supplier: Option<String>,
    pub note: Option<String>,
}

impl NewBatch {
    pub fn into_batch(self, id: i64) -> Batch {
        Batch {
            id,
            product_id: self.product_id,
            original_qty: self.quantity,
            remaining_qty: self.quantity,
            restocked_at: self.restocked_at,
            shelf_life_days: self.shelf_life_days,
            expires_at: self.expires_at,
            supplier: self.supplier,
            note: self.note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchMutation {
    Create(NewBatch),
    Consume(Vec<BatchDraw>),
}

/// A ledger entry before the store assigns its id (and batch id, for increases)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub product_id: Uuid,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub delta: Decimal,
    pub change_kind: ChangeKind,
    pub note: Option<String>,
    pub loss_category: Option<LossCategory>,
    pub loss_value: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Everything a store must persist atomically for one stock change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub mutation: BatchMutation,
    pub entry: NewLedgerEntry,
}

impl AllocationPlan {
    pub fn stock_after(&self) -> Decimal {
        self.entry.stock_after
    }
}

/// Monetary loss of removing `delta` units bought at `purchase_price`
pub fn loss_value(purchase_price: Decimal, delta: Decimal) -> Result<Decimal, AllocationError> {
    purchase_price
        .checked_mul(delta.abs())
        .ok_or(AllocationError::ValueOverflow)
}

fn check_range(quantity: Decimal) -> Result<(), AllocationError> {
    validate_quantity_range(quantity).map_err(|_| AllocationError::QuantityOutOfRange(quantity))
}

/// Plan a stock change for `product`.
///
/// `batches` may include exhausted batches; only active ones are drawn from.
pub fn plan_stock_change(
    product: &Product,
    batches: &[Batch],
    request: StockRequest,
    options: &StockChangeOptions,
    now: DateTime<Utc>,
) -> Result<AllocationPlan, AllocationError> {
    if let StockRequest::SetAbsolute(target) = request {
        if target < Decimal::ZERO || !product.unit_kind.accepts(target) {
            return Err(AllocationError::InvalidQuantity {
                unit_kind: product.unit_kind,
                quantity: target,
            });
        }
        check_range(target)?;
    }

    let delta = request.delta_against(product.stock);
    check_range(delta)?;
    if delta.is_zero() {
        return Err(AllocationError::InvalidDelta);
    }
    if !product.unit_kind.accepts(delta) {
        return Err(AllocationError::InvalidQuantity {
            unit_kind: product.unit_kind,
            quantity: delta,
        });
    }

    if delta > Decimal::ZERO {
        plan_increase(product, request, delta, options, now)
    } else {
        plan_decrease(product, batches, request, delta, options, now)
    }
}

fn plan_increase(
    product: &Product,
    request: StockRequest,
    delta: Decimal,
    options: &StockChangeOptions,
    now: DateTime<Utc>,
) -> Result<AllocationPlan, AllocationError> {
    if options.loss_category.is_some() {
        return Err(AllocationError::UnexpectedLossCategory);
    }

    let change_kind = options.change_kind.unwrap_or(match request {
        StockRequest::SetAbsolute(_) => ChangeKind::Adjustment,
        StockRequest::AdjustBy(_) => ChangeKind::Purchase,
    });
    if !change_kind.allows_increase() {
        return Err(AllocationError::KindCannotIncrease(change_kind.as_str()));
    }

    let shelf_life_days = options
        .shelf_life_days
        .or(product.default_shelf_life_days)
        .ok_or(AllocationError::MissingShelfLife)?;
    validate_shelf_life(shelf_life_days)
        .map_err(|_| AllocationError::InvalidShelfLife(shelf_life_days))?;
    let expires_at = Batch::expiry_for(now, shelf_life_days)
        .ok_or(AllocationError::InvalidShelfLife(shelf_life_days))?;

    let stock_after = product
        .stock
        .checked_add(delta)
        .ok_or(AllocationError::ValueOverflow)?;
    check_range(stock_after)?;

    let batch = NewBatch {
        product_id: product.id,
        quantity: delta,
        restocked_at: now,
        shelf_life_days,
        expires_at,
        supplier: options.supplier.clone(),
        note: options.note.clone(),
    };

    Ok(AllocationPlan {
        mutation: BatchMutation::Create(batch),
        entry: NewLedgerEntry {
            product_id: product.id,
            stock_before: product.stock,
            stock_after,
            delta,
            change_kind,
            note: options.note.clone(),
            loss_category: None,
            loss_value: None,
            created_at: now,
        },
    })
}

fn plan_decrease(
    product: &Product,
    batches: &[Batch],
    request: StockRequest,
    delta: Decimal,
    options: &StockChangeOptions,
    now: DateTime<Utc>,
) -> Result<AllocationPlan, AllocationError> {
    let change_kind = options.change_kind.unwrap_or(match (request, options.loss_category) {
        (_, Some(_)) => ChangeKind::WriteOff,
        (StockRequest::SetAbsolute(_), None) => ChangeKind::Adjustment,
        (StockRequest::AdjustBy(_), None) => ChangeKind::Sale,
    });
    if !change_kind.allows_decrease() {
        return Err(AllocationError::KindCannotDecrease(change_kind.as_str()));
    }
    if change_kind == ChangeKind::WriteOff && options.loss_category.is_none() {
        return Err(AllocationError::MissingLossCategory);
    }

    let requested = delta.abs();
    if requested > product.stock {
        return Err(AllocationError::InsufficientStock {
            requested,
            available: product.stock,
        });
    }

    let draws = plan_consumption(batches, requested)?;
    let loss_value = match options.loss_category {
        Some(_) => Some(loss_value(product.purchase_price, delta)?),
        None => None,
    };

    Ok(AllocationPlan {
        mutation: BatchMutation::Consume(draws),
        entry: NewLedgerEntry {
            product_id: product.id,
            stock_before: product.stock,
            stock_after: product.stock - requested,
            delta,
            change_kind,
            note: options.note.clone(),
            loss_category: options.loss_category,
            loss_value,
            created_at: now,
        },
    })
}

/// Draw `quantity` from the active batches, earliest expiry first
pub fn plan_consumption(
    batches: &[Batch],
    quantity: Decimal,
) -> Result<Vec<BatchDraw>, AllocationError> {
    if quantity <= Decimal::ZERO {
        return Err(AllocationError::InvalidDelta);
    }

    let mut active: Vec<&Batch> = batches.iter().filter(|b| b.is_active()).collect();
    active.sort_by(|a, b| fifo_order(a, b));

    let available: Decimal = active.iter().map(|b| b.remaining_qty).sum();
    if quantity > available {
        return Err(AllocationError::InsufficientStock {
            requested: quantity,
            available,
        });
    }

    let mut outstanding = quantity;
    let mut draws = Vec::new();
    for batch in active {
        if outstanding.is_zero() {
            break;
        }
        let take = batch.remaining_qty.min(outstanding);
        outstanding -= take;
        draws.push(BatchDraw {
            batch_id: batch.id,
            quantity: take,
            remaining_after: batch.remaining_qty - take,
        });
    }

    Ok(draws)
}

/// Apply planned draws to batches held in memory
pub fn apply_draws(batches: &mut [Batch], draws: &[BatchDraw]) {
    for draw in draws {
        if let Some(batch) = batches.iter_mut().find(|b| b.id == draw.batch_id) {
            batch.remaining_qty = draw.remaining_after;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::days(n)
    }

    fn product(stock: &str, unit_kind: UnitKind) -> Product {
        Product {
            id: Uuid::nil(),
            barcode: "899000001".to_string(),
            name: "Tomat".to_string(),
            category: Some("Sayur".to_string()),
            unit_kind,
            purchase_price: dec("5000"),
            sale_price: dec("7000"),
            stock: dec(stock),
            default_shelf_life_days: None,
            warning_lead_days: None,
            low_stock_threshold: None,
            created_at: day(0),
            updated_at: day(0),
        }
    }

    fn batch(id: i64, remaining: &str, expires_day: i64) -> Batch {
        Batch {
            id,
            product_id: Uuid::nil(),
            original_qty: dec(remaining),
            remaining_qty: dec(remaining),
            restocked_at: day(0),
            shelf_life_days: expires_day as i32,
            expires_at: day(expires_day),
            supplier: None,
            note: None,
        }
    }

    fn shelf_life(days: i32) -> StockChangeOptions {
        StockChangeOptions {
            shelf_life_days: Some(days),
            ..Default::default()
        }
    }

    #[test]
    fn test_increase_creates_batch() {
        let p = product("0", UnitKind::Fixed);
        let plan = plan_stock_change(&p, &[], StockRequest::AdjustBy(dec("100")), &shelf_life(7), day(0))
            .unwrap();

        match plan.mutation {
            BatchMutation::Create(ref b) => {
                assert_eq!(b.quantity, dec("100"));
                assert_eq!(b.expires_at, day(7));
            }
            _ => panic!("expected batch creation"),
        }
        assert_eq!(plan.entry.change_kind, ChangeKind::Purchase);
        assert_eq!(plan.stock_after(), dec("100"));
    }

    #[test]
    fn test_increase_falls_back_to_product_shelf_life() {
        let mut p = product("0", UnitKind::Bulk);
        p.default_shelf_life_days = Some(3);
        let plan = plan_stock_change(
            &p,
            &[],
            StockRequest::AdjustBy(dec("2.5")),
            &StockChangeOptions::default(),
            day(0),
        )
        .unwrap();

        match plan.mutation {
            BatchMutation::Create(b) => assert_eq!(b.shelf_life_days, 3),
            _ => panic!("expected batch creation"),
        }
    }

    #[test]
    fn test_increase_without_shelf_life_rejected() {
        let p = product("0", UnitKind::Fixed);
        let err = plan_stock_change(
            &p,
            &[],
            StockRequest::AdjustBy(dec("5")),
            &StockChangeOptions::default(),
            day(0),
        )
        .unwrap_err();
        assert_eq!(err, AllocationError::MissingShelfLife);
    }

    #[test]
    fn test_zero_delta_rejected() {
        let p = product("10", UnitKind::Fixed);
        let err = plan_stock_change(&p, &[], StockRequest::AdjustBy(Decimal::ZERO), &shelf_life(7), day(0))
            .unwrap_err();
        assert_eq!(err, AllocationError::InvalidDelta);

        let err = plan_stock_change(&p, &[], StockRequest::SetAbsolute(dec("10")), &shelf_life(7), day(0))
            .unwrap_err();
        assert_eq!(err, AllocationError::InvalidDelta);
    }

    #[test]
    fn test_fixed_goods_reject_fractions() {
        let p = product("10", UnitKind::Fixed);
        let err = plan_stock_change(&p, &[], StockRequest::AdjustBy(dec("1.5")), &shelf_life(7), day(0))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidQuantity { .. }));
    }

    #[test]
    fn test_fifo_single_batch() {
        let batches = vec![batch(2, "10", 10), batch(1, "5", 5)];
        let draws = plan_consumption(&batches, dec("4")).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].batch_id, 1);
        assert_eq!(draws[0].remaining_after, dec("1"));
    }

    #[test]
    fn test_fifo_spans_batches() {
        let batches = vec![batch(1, "5", 5), batch(2, "10", 10)];
        let draws = plan_consumption(&batches, dec("8")).unwrap();
        assert_eq!(
            draws,
            vec![
                BatchDraw { batch_id: 1, quantity: dec("5"), remaining_after: dec("0") },
                BatchDraw { batch_id: 2, quantity: dec("3"), remaining_after: dec("7") },
            ]
        );
    }

    #[test]
    fn test_fifo_ties_break_on_creation_order() {
        let batches = vec![batch(9, "5", 5), batch(3, "5", 5)];
        let draws = plan_consumption(&batches, dec("2")).unwrap();
        assert_eq!(draws[0].batch_id, 3);
    }

    #[test]
    fn test_exhausted_batches_are_skipped() {
        let mut b1 = batch(1, "5", 1);
        b1.remaining_qty = Decimal::ZERO;
        let batches = vec![b1, batch(2, "5", 5)];
        let draws = plan_consumption(&batches, dec("1")).unwrap();
        assert_eq!(draws[0].batch_id, 2);
    }

    #[test]
    fn test_decrease_beyond_stock_rejected() {
        let p = product("5", UnitKind::Fixed);
        let err = plan_stock_change(
            &p,
            &[batch(1, "5", 5)],
            StockRequest::AdjustBy(dec("-6")),
            &StockChangeOptions::default(),
            day(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientStock { requested: dec("6"), available: dec("5") }
        );
    }

    #[test]
    fn test_loss_value_computed() {
        let p = product("20", UnitKind::Fixed);
        let options = StockChangeOptions {
            loss_category: Some(LossCategory::Damaged),
            claimed_loss_value: Some(dec("1")),
            ..Default::default()
        };
        let plan = plan_stock_change(
            &p,
            &[batch(1, "20", 5)],
            StockRequest::AdjustBy(dec("-10")),
            &options,
            day(1),
        )
        .unwrap();

        assert_eq!(plan.entry.delta, dec("-10"));
        assert_eq!(plan.entry.loss_value, Some(dec("50000")));
        assert_eq!(plan.entry.change_kind, ChangeKind::WriteOff);
    }

    #[test]
    fn test_sale_has_no_loss_value() {
        let p = product("20", UnitKind::Fixed);
        let plan = plan_stock_change(
            &p,
            &[batch(1, "20", 5)],
            StockRequest::AdjustBy(dec("-3")),
            &StockChangeOptions::default(),
            day(1),
        )
        .unwrap();
        assert_eq!(plan.entry.change_kind, ChangeKind::Sale);
        assert_eq!(plan.entry.loss_value, None);
    }

    #[test]
    fn test_write_off_requires_category() {
        let p = product("20", UnitKind::Fixed);
        let options = StockChangeOptions {
            change_kind: Some(ChangeKind::WriteOff),
            ..Default::default()
        };
        let err = plan_stock_change(&p, &[batch(1, "20", 5)], StockRequest::AdjustBy(dec("-1")), &options, day(1))
            .unwrap_err();
        assert_eq!(err, AllocationError::MissingLossCategory);
    }

    #[test]
    fn test_incompatible_change_kinds() {
        let p = product("20", UnitKind::Fixed);
        let sale = StockChangeOptions {
            change_kind: Some(ChangeKind::Sale),
            shelf_life_days: Some(3),
            ..Default::default()
        };
        assert_eq!(
            plan_stock_change(&p, &[], StockRequest::AdjustBy(dec("1")), &sale, day(0)).unwrap_err(),
            AllocationError::KindCannotIncrease("sale")
        );

        let purchase = StockChangeOptions {
            change_kind: Some(ChangeKind::Purchase),
            ..Default::default()
        };
        assert_eq!(
            plan_stock_change(&p, &[batch(1, "20", 5)], StockRequest::AdjustBy(dec("-1")), &purchase, day(0))
                .unwrap_err(),
            AllocationError::KindCannotDecrease("purchase")
        );
    }

    #[test]
    fn test_set_absolute_normalizes_to_delta() {
        let p = product("20", UnitKind::Fixed);
        let plan = plan_stock_change(
            &p,
            &[batch(1, "20", 5)],
            StockRequest::SetAbsolute(dec("12")),
            &StockChangeOptions::default(),
            day(1),
        )
        .unwrap();
        assert_eq!(plan.entry.delta, dec("-8"));
        assert_eq!(plan.entry.change_kind, ChangeKind::Adjustment);
        assert_eq!(plan.stock_after(), dec("12"));
    }

    #[test]
    fn test_set_absolute_rejects_negative_target() {
        let p = product("20", UnitKind::Bulk);
        let err = plan_stock_change(&p, &[], StockRequest::SetAbsolute(dec("-1")), &shelf_life(3), day(0))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidQuantity { .. }));
    }

    #[test]
    fn test_shelf_life_outside_calendar_rejected() {
        let p = product("0", UnitKind::Fixed);
        let err = plan_stock_change(&p, &[], StockRequest::AdjustBy(dec("1")), &shelf_life(i32::MAX), day(0))
            .unwrap_err();
        assert_eq!(err, AllocationError::InvalidShelfLife(i32::MAX));

        let err = plan_stock_change(&p, &[], StockRequest::AdjustBy(dec("1")), &shelf_life(3651), day(0))
            .unwrap_err();
        assert_eq!(err, AllocationError::InvalidShelfLife(3651));
    }

    #[test]
    fn test_quantities_beyond_storage_rejected() {
        let p = product("0", UnitKind::Bulk);
        let err = plan_stock_change(&p, &[], StockRequest::AdjustBy(Decimal::MAX), &shelf_life(3), day(0))
            .unwrap_err();
        assert_eq!(err, AllocationError::QuantityOutOfRange(Decimal::MAX));

        let full = product("99999999999.999", UnitKind::Bulk);
        let err = plan_stock_change(&full, &[], StockRequest::AdjustBy(dec("1")), &shelf_life(3), day(0))
            .unwrap_err();
        assert!(matches!(err, AllocationError::QuantityOutOfRange(_)));
    }

    #[test]
    fn test_loss_value_overflow_is_an_error() {
        let mut p = product("2", UnitKind::Fixed);
        p.purchase_price = Decimal::MAX;
        let options = StockChangeOptions {
            loss_category: Some(LossCategory::Damaged),
            ..Default::default()
        };
        let err = plan_stock_change(&p, &[batch(1, "2", 5)], StockRequest::AdjustBy(dec("-2")), &options, day(1))
            .unwrap_err();
        assert_eq!(err, AllocationError::ValueOverflow);
        assert_eq!(loss_value(dec("5000"), dec("-3")), Ok(dec("15000")));
    }

    #[test]
    fn test_consumption_needs_positive_quantity() {
        let batches = vec![batch(1, "10", 5)];
        assert_eq!(plan_consumption(&batches, dec("-5")), Err(AllocationError::InvalidDelta));
        assert_eq!(plan_consumption(&batches, Decimal::ZERO), Err(AllocationError::InvalidDelta));
    }

    #[test]
    fn test_apply_draws() {
        let mut batches = vec![batch(1, "5", 5), batch(2, "10", 10)];
        let draws = plan_consumption(&batches, dec("8")).unwrap();
        apply_draws(&mut batches, &draws);
        assert_eq!(batches[0].remaining_qty, Decimal::ZERO);
        assert_eq!(batches[1].remaining_qty, dec("7"));
    }
}
