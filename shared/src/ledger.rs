//! Ledger reconciliation
//!
//! The ledger is the audit source of truth: folding its deltas forward from
//! the oldest entry's `stock_before` must land on the product's stock, and
//! the product's stock must equal what its active batches hold.

use rust_decimal::Decimal;

use crate::models::{AuditFinding, Batch, LossCategory, LossSummary, Product, StockLedgerEntry};

/// Stock reproduced by folding `entries` in id order.
///
/// Returns `None` for an empty ledger.
pub fn replay(entries: &[StockLedgerEntry]) -> Option<Decimal> {
    let mut ordered: Vec<&StockLedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.id);

    let first = ordered.first()?;
    Some(
        ordered
            .iter()
            .fold(first.stock_before, |stock, entry| stock + entry.delta),
    )
}

/// Whether consecutive entries chain (`after` of one is `before` of the next)
/// and each entry's delta matches its before/after pair
pub fn is_chained(entries: &[StockLedgerEntry]) -> bool {
    let mut ordered: Vec<&StockLedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.id);

    ordered
        .iter()
        .all(|e| e.stock_after - e.stock_before == e.delta)
        && ordered
            .windows(2)
            .all(|pair| pair[0].stock_after == pair[1].stock_before)
}

/// Sum of remaining quantity over active batches
pub fn active_batch_total(batches: &[Batch]) -> Decimal {
    batches
        .iter()
        .filter(|b| b.is_active())
        .map(|b| b.remaining_qty)
        .sum()
}

/// Check both stock invariants for one product
pub fn audit_product(
    product: &Product,
    batches: &[Batch],
    entries: &[StockLedgerEntry],
) -> AuditFinding {
    let batch_total = active_batch_total(batches);
    let ledger_total = replay(entries);
    let ledger_ok = match ledger_total {
        Some(total) => total == product.stock && is_chained(entries),
        None => product.stock.is_zero(),
    };
    let batches_ok = batch_total == product.stock
        && batches
            .iter()
            .all(|b| b.remaining_qty >= Decimal::ZERO && b.remaining_qty <= b.original_qty);

    AuditFinding {
        product_id: product.id,
        stock: product.stock,
        batch_total,
        ledger_total,
        consistent: ledger_ok && batches_ok,
    }
}

/// Group loss-attributed entries by category, ordered by category
pub fn summarize_losses(entries: &[StockLedgerEntry]) -> Vec<LossSummary> {
    let mut summaries: std::collections::BTreeMap<LossCategory, LossSummary> =
        std::collections::BTreeMap::new();

    for entry in entries {
        let Some(category) = entry.loss_category else {
            continue;
        };
        let summary = summaries.entry(category).or_insert(LossSummary {
            loss_category: category,
            entry_count: 0,
            total_quantity: Decimal::ZERO,
            total_value: Decimal::ZERO,
        });
        summary.entry_count += 1;
        summary.total_quantity += entry.delta.abs();
        summary.total_value += entry.loss_value.unwrap_or(Decimal::ZERO);
    }

    summaries.into_values().collect()
}
