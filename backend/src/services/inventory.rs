//! Inventory service: products, stock changes, expiry and loss reporting
//!
//! Every stock change funnels into [`InventoryService::apply_stock_change`],
//! which hands the normalized request to the store. The store stamps the
//! time, plans and commits under the product lock; this layer only validates
//! input shape and logs the outcome.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::allocation::{StockChangeOptions, StockRequest};
use shared::expiry::is_expiring_within;
use shared::ledger::{audit_product, summarize_losses};
use shared::validation::{
    validate_barcode, validate_delta_sign, validate_prices, validate_quantity_range,
};
use shared::{
    AuditFinding, BatchView, ChangeKind, CreateProductInput, ExpiringBatch, ExpiryStatus,
    LossCategory, LossSummary, Product, StockLedgerEntry, TimeRange, UnitKind,
    UpdateProductInput,
};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::clock::{Clock, SystemClock};
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::store::{InventoryStore, StockChangeOutcome};

/// Inventory service over any [`InventoryStore`]
#[derive(Clone)]
pub struct InventoryService<S: InventoryStore> {
    store: S,
    clock: Arc<dyn Clock>,
    settings: InventoryConfig,
}

/// Current stock of one product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLevel {
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    #[serde(rename = "stok")]
    pub stock: Decimal,
    #[serde(rename = "tipeProduk")]
    pub unit_kind: UnitKind,
    #[serde(rename = "lowStock")]
    pub low_stock: bool,
}

/// Input for `POST /stock/increase`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IncreaseStockInput {
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    #[serde(rename = "perubahan")]
    pub delta: Decimal,
    #[serde(rename = "jenis")]
    pub change_kind: Option<ChangeKind>,
    #[serde(rename = "keterangan")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[serde(rename = "masaSimpanHari")]
    #[validate(range(min = 1, max = 3650))]
    pub shelf_life_days: Option<i32>,
}

/// Input for `POST /stock/decrease`; `perubahan` is negative
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DecreaseStockInput {
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    #[serde(rename = "perubahan")]
    pub delta: Decimal,
    #[serde(rename = "jenis")]
    pub change_kind: Option<ChangeKind>,
    #[serde(rename = "keterangan")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[serde(rename = "tipeKerugian")]
    pub loss_category: Option<LossCategory>,
    /// Loss value as computed by the till; compared against ours, never stored
    #[serde(rename = "nilaiKerugian")]
    pub claimed_loss_value: Option<Decimal>,
}

/// Input for `POST /stock/set`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetStockInput {
    #[serde(rename = "produkId")]
    pub product_id: Uuid,
    #[serde(rename = "stokBaru")]
    pub target: Decimal,
    #[serde(rename = "jenis")]
    pub change_kind: Option<ChangeKind>,
    #[serde(rename = "keterangan")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[serde(rename = "masaSimpanHari")]
    #[validate(range(min = 1, max = 3650))]
    pub shelf_life_days: Option<i32>,
    #[serde(rename = "tipeKerugian")]
    pub loss_category: Option<LossCategory>,
}

/// Body of the generic `POST /products/:id/stock`. Exactly one of
/// `perubahan` and `stokBaru` must be present.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StockUpdateInput {
    #[serde(rename = "perubahan")]
    pub delta: Option<Decimal>,
    #[serde(rename = "stokBaru")]
    pub target: Option<Decimal>,
    #[serde(rename = "jenis")]
    pub change_kind: Option<ChangeKind>,
    #[serde(rename = "keterangan")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(max = 200))]
    pub supplier: Option<String>,
    #[serde(rename = "masaSimpanHari")]
    #[validate(range(min = 1, max = 3650))]
    pub shelf_life_days: Option<i32>,
    #[serde(rename = "tipeKerugian")]
    pub loss_category: Option<LossCategory>,
    #[serde(rename = "nilaiKerugian")]
    pub claimed_loss_value: Option<Decimal>,
}

impl TryFrom<StockUpdateInput> for (StockRequest, StockChangeOptions) {
    type Error = AppError;

    fn try_from(input: StockUpdateInput) -> Result<Self, Self::Error> {
        let request = match (input.delta, input.target) {
            (Some(delta), None) => StockRequest::AdjustBy(delta),
            (None, Some(target)) => StockRequest::SetAbsolute(target),
            (Some(_), Some(_)) => {
                return Err(AppError::validation(
                    "perubahan",
                    "Provide either perubahan or stokBaru, not both",
                    "Isi salah satu dari perubahan atau stokBaru, bukan keduanya",
                ))
            }
            (None, None) => {
                return Err(AppError::validation(
                    "perubahan",
                    "Either perubahan or stokBaru is required",
                    "Perubahan atau stokBaru wajib diisi",
                ))
            }
        };

        let options = StockChangeOptions {
            change_kind: input.change_kind,
            note: input.note,
            supplier: input.supplier,
            shelf_life_days: input.shelf_life_days,
            loss_category: input.loss_category,
            claimed_loss_value: input.claimed_loss_value,
        };
        Ok((request, options))
    }
}

/// Result of checking every product's stock against its batches and ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub checked: usize,
    pub inconsistent: usize,
    pub findings: Vec<AuditFinding>,
}

fn validate_threshold(threshold: Option<Decimal>) -> AppResult<()> {
    let Some(threshold) = threshold else {
        return Ok(());
    };
    if threshold < Decimal::ZERO {
        return Err(AppError::validation(
            "stokMinimum",
            "Low-stock threshold cannot be negative",
            "Stok minimum tidak boleh negatif",
        ));
    }
    validate_quantity_range(threshold).map_err(|msg| {
        AppError::validation("stokMinimum", msg, "Stok minimum melebihi batas")
    })
}

impl<S: InventoryStore> InventoryService<S> {
    /// Create a service on the system clock
    pub fn new(store: S, settings: InventoryConfig) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, settings: InventoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lead_days(&self, product: &Product) -> i32 {
        product
            .warning_lead_days
            .unwrap_or(self.settings.default_warning_days)
    }

    // ========================================================================
    // Products
    // ========================================================================

    /// Register a product with zero stock
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        validate_barcode(&input.barcode)
            .map_err(|msg| AppError::validation("barcode", msg, "Barcode tidak valid"))?;
        validate_prices(input.purchase_price, input.sale_price).map_err(|msg| {
            AppError::validation("hargaBeli", msg, "Harga tidak valid")
        })?;
        validate_threshold(input.low_stock_threshold)?;

        let now = self.clock.now();
        let product = Product {
            id: Uuid::new_v4(),
            barcode: input.barcode,
            name: input.name,
            category: input.category,
            unit_kind: input.unit_kind,
            purchase_price: input.purchase_price,
            sale_price: input.sale_price,
            stock: Decimal::ZERO,
            default_shelf_life_days: input.default_shelf_life_days,
            warning_lead_days: input.warning_lead_days,
            low_stock_threshold: input.low_stock_threshold,
            created_at: now,
            updated_at: now,
        };

        let product = self.store.create_product(product).await?;
        info!(product_id = %product.id, barcode = %product.barcode, "Product registered");
        Ok(product)
    }

    /// Update product metadata; stock is never touched here
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        let purchase = input.purchase_price.unwrap_or(Decimal::ZERO);
        let sale = input.sale_price.unwrap_or(Decimal::ZERO);
        validate_prices(purchase, sale).map_err(|msg| {
            AppError::validation("hargaBeli", msg, "Harga tidak valid")
        })?;
        validate_threshold(input.low_stock_threshold)?;

        self.store
            .update_product(product_id, &input, self.clock.now())
            .await
    }

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        self.store.get_product(product_id).await
    }

    /// All products ordered by name
    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        self.store.list_products().await
    }

    pub async fn get_stock(&self, product_id: Uuid) -> AppResult<StockLevel> {
        let product = self.store.get_product(product_id).await?;
        Ok(StockLevel {
            product_id: product.id,
            stock: product.stock,
            unit_kind: product.unit_kind,
            low_stock: product.is_low_stock(),
        })
    }

    /// Products at or below their low-stock threshold
    pub async fn list_low_stock(&self) -> AppResult<Vec<Product>> {
        let products = self.store.list_products().await?;
        Ok(products.into_iter().filter(Product::is_low_stock).collect())
    }

    // ========================================================================
    // Stock changes
    // ========================================================================

    /// Add stock as a new batch
    pub async fn increase_stock(&self, input: IncreaseStockInput) -> AppResult<StockChangeOutcome> {
        input.validate()?;
        validate_delta_sign(input.delta, true).map_err(|msg| {
            AppError::validation("perubahan", msg, "Penambahan stok harus bernilai positif")
        })?;

        let options = StockChangeOptions {
            change_kind: input.change_kind,
            note: input.note,
            supplier: input.supplier,
            shelf_life_days: input.shelf_life_days,
            loss_category: None,
            claimed_loss_value: None,
        };
        self.apply_stock_change(input.product_id, StockRequest::AdjustBy(input.delta), options)
            .await
    }

    /// Remove stock from the earliest-expiring batches
    pub async fn decrease_stock(&self, input: DecreaseStockInput) -> AppResult<StockChangeOutcome> {
        input.validate()?;
        validate_delta_sign(input.delta, false).map_err(|msg| {
            AppError::validation("perubahan", msg, "Pengurangan stok harus bernilai negatif")
        })?;

        let options = StockChangeOptions {
            change_kind: input.change_kind,
            note: input.note,
            supplier: None,
            shelf_life_days: None,
            loss_category: input.loss_category,
            claimed_loss_value: input.claimed_loss_value,
        };
        self.apply_stock_change(input.product_id, StockRequest::AdjustBy(input.delta), options)
            .await
    }

    /// Move stock to an absolute quantity
    pub async fn set_stock(&self, input: SetStockInput) -> AppResult<StockChangeOutcome> {
        input.validate()?;
        if input.target < Decimal::ZERO {
            return Err(AppError::validation(
                "stokBaru",
                "Stock cannot be set below zero",
                "Stok tidak boleh kurang dari nol",
            ));
        }

        let options = StockChangeOptions {
            change_kind: input.change_kind,
            note: input.note,
            supplier: input.supplier,
            shelf_life_days: input.shelf_life_days,
            loss_category: input.loss_category,
            claimed_loss_value: None,
        };
        self.apply_stock_change(input.product_id, StockRequest::SetAbsolute(input.target), options)
            .await
    }

    /// Generic stock update taking either a delta or an absolute target
    pub async fn update_stock(
        &self,
        product_id: Uuid,
        input: StockUpdateInput,
    ) -> AppResult<StockChangeOutcome> {
        input.validate()?;
        let (request, options): (StockRequest, StockChangeOptions) = input.try_into()?;
        self.apply_stock_change(product_id, request, options).await
    }

    /// Single entry point for every stock mutation
    pub async fn apply_stock_change(
        &self,
        product_id: Uuid,
        request: StockRequest,
        options: StockChangeOptions,
    ) -> AppResult<StockChangeOutcome> {
        let outcome = match self
            .store
            .apply_stock_change(product_id, request, &options, &*self.clock)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_retryable() {
                    warn!(%product_id, ?request, "Stock change hit a concurrent update");
                } else {
                    debug!(%product_id, ?request, error = %err, "Stock change rejected");
                }
                return Err(err);
            }
        };

        let entry = &outcome.entry;
        info!(
            %product_id,
            entry_id = entry.id,
            delta = %entry.delta,
            stock_before = %entry.stock_before,
            stock_after = %entry.stock_after,
            change_kind = entry.change_kind.as_str(),
            "Stock change committed"
        );

        if let (Some(claimed), Some(computed)) = (options.claimed_loss_value, entry.loss_value) {
            if claimed != computed {
                warn!(
                    %product_id,
                    entry_id = entry.id,
                    %claimed,
                    %computed,
                    "Caller loss value differs from computed value, recorded the computed one"
                );
            }
        }

        Ok(outcome)
    }

    // ========================================================================
    // Batches and expiry
    // ========================================================================

    /// Active batches expiring within `within_days` (config default when
    /// `None`), soonest first
    pub async fn list_expiring_batches(
        &self,
        within_days: Option<i64>,
    ) -> AppResult<Vec<ExpiringBatch>> {
        let within = within_days.unwrap_or(self.settings.expiring_window_days);
        if within < 0 {
            return Err(AppError::validation(
                "withinDays",
                "withinDays cannot be negative",
                "withinDays tidak boleh negatif",
            ));
        }

        let mut batches = self
            .labelled_active_batches()
            .await?
            .into_iter()
            .filter(|b| is_expiring_within(b.batch.remaining_days, within))
            .collect::<Vec<_>>();
        batches.sort_by(|a, b| {
            a.batch
                .remaining_days
                .cmp(&b.batch.remaining_days)
                .then(a.batch.batch.id.cmp(&b.batch.batch.id))
        });
        Ok(batches)
    }

    /// Active batches already past expiry, oldest expiry first
    pub async fn list_expired_batches(&self) -> AppResult<Vec<ExpiringBatch>> {
        let mut batches = self
            .labelled_active_batches()
            .await?
            .into_iter()
            .filter(|b| b.batch.status == ExpiryStatus::Expired)
            .collect::<Vec<_>>();
        batches.sort_by(|a, b| {
            a.batch
                .remaining_days
                .cmp(&b.batch.remaining_days)
                .then(a.batch.batch.id.cmp(&b.batch.batch.id))
        });
        Ok(batches)
    }

    async fn labelled_active_batches(&self) -> AppResult<Vec<ExpiringBatch>> {
        let now = self.clock.now();
        let rows = self.store.list_active_batches().await?;

        Ok(rows
            .into_iter()
            .map(|(product, batch)| {
                let remaining_value = product.purchase_price.checked_mul(batch.remaining_qty);
                if remaining_value.is_none() {
                    warn!(
                        product_id = %product.id,
                        batch_id = batch.id,
                        "Remaining batch value overflows, reported without a value"
                    );
                }
                ExpiringBatch {
                    batch: BatchView::new(batch, now, self.lead_days(&product)),
                    product_name: product.name,
                    barcode: product.barcode,
                    category: product.category,
                    unit_kind: product.unit_kind,
                    remaining_value,
                }
            })
            .collect())
    }

    /// Every batch of a product, exhausted ones included, oldest first
    pub async fn list_batches_for_product(&self, product_id: Uuid) -> AppResult<Vec<BatchView>> {
        let snapshot = self.store.snapshot(product_id).await?;
        let now = self.clock.now();
        let lead = self.lead_days(&snapshot.product);

        let mut batches = snapshot.batches;
        batches.sort_by_key(|b| b.id);
        Ok(batches
            .into_iter()
            .map(|batch| BatchView::new(batch, now, lead))
            .collect())
    }

    // ========================================================================
    // Ledger and reports
    // ========================================================================

    /// Ledger entries for one product, newest first
    pub async fn get_history(&self, product_id: Uuid) -> AppResult<Vec<StockLedgerEntry>> {
        self.store.list_history(product_id).await
    }

    /// Loss totals by category over `range`
    pub async fn loss_summary(&self, range: TimeRange) -> AppResult<Vec<LossSummary>> {
        if !range.is_valid() {
            return Err(AppError::validation(
                "from",
                "Report start must not be after its end",
                "Tanggal awal laporan tidak boleh setelah tanggal akhir",
            ));
        }
        let entries = self.store.list_loss_entries(range).await?;
        Ok(summarize_losses(&entries))
    }

    /// Check every product's stock against its batches and ledger
    pub async fn audit(&self) -> AppResult<AuditReport> {
        let products = self.store.list_products().await?;
        let mut findings = Vec::with_capacity(products.len());

        for product in products {
            let snapshot = self.store.snapshot(product.id).await?;
            let finding = audit_product(&snapshot.product, &snapshot.batches, &snapshot.entries);
            if !finding.consistent {
                warn!(
                    product_id = %finding.product_id,
                    stock = %finding.stock,
                    batch_total = %finding.batch_total,
                    ledger_total = ?finding.ledger_total,
                    "Stock audit found an inconsistency"
                );
            }
            findings.push(finding);
        }

        let inconsistent = findings.iter().filter(|f| !f.consistent).count();
        info!(checked = findings.len(), inconsistent, "Stock audit finished");

        Ok(AuditReport {
            checked: findings.len(),
            inconsistent,
            findings,
        })
    }
}
