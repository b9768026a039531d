//! PostgreSQL inventory store
//!
//! A stock change is one transaction: the product row is locked with
//! `SELECT ... FOR UPDATE` under a local `lock_timeout`, so concurrent changes
//! to one product serialize while other products proceed. Lock timeouts,
//! serialization failures and deadlocks surface as `ConcurrencyConflict`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::allocation::{plan_stock_change, BatchMutation, StockChangeOptions, StockRequest};
use shared::{
    Batch, ChangeKind, LossCategory, Product, StockLedgerEntry, TimeRange, UnitKind,
    UpdateProductInput,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{InventoryStore, ProductSnapshot, StockChangeOutcome};
use crate::error::{AppError, AppResult};
use crate::services::Clock;

const PRODUCT_COLUMNS: &str = "id, barcode, name, category, unit_kind, purchase_price, sale_price, \
     stock, default_shelf_life_days, warning_lead_days, low_stock_threshold, created_at, updated_at";

const BATCH_COLUMNS: &str = "id, product_id, original_qty, remaining_qty, restocked_at, \
     shelf_life_days, expires_at, supplier, note";

const LEDGER_COLUMNS: &str = "id, product_id, stock_before, stock_after, delta, change_kind, note, \
     loss_category, loss_value, batch_id, created_at";

/// Inventory store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
    lock_timeout: Duration,
}

/// Row for product queries
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    barcode: String,
    name: String,
    category: Option<String>,
    unit_kind: String,
    purchase_price: Decimal,
    sale_price: Decimal,
    stock: Decimal,
    default_shelf_life_days: Option<i32>,
    warning_lead_days: Option<i32>,
    low_stock_threshold: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> AppResult<Self> {
        let unit_kind = UnitKind::parse(&row.unit_kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown unit kind: {}", row.unit_kind)))?;
        Ok(Product {
            id: row.id,
            barcode: row.barcode,
            name: row.name,
            category: row.category,
            unit_kind,
            purchase_price: row.purchase_price,
            sale_price: row.sale_price,
            stock: row.stock,
            default_shelf_life_days: row.default_shelf_life_days,
            warning_lead_days: row.warning_lead_days,
            low_stock_threshold: row.low_stock_threshold,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row for batch queries
#[derive(Debug, FromRow)]
struct BatchRow {
    id: i64,
    product_id: Uuid,
    original_qty: Decimal,
    remaining_qty: Decimal,
    restocked_at: DateTime<Utc>,
    shelf_life_days: i32,
    expires_at: DateTime<Utc>,
    supplier: Option<String>,
    note: Option<String>,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            product_id: row.product_id,
            original_qty: row.original_qty,
            remaining_qty: row.remaining_qty,
            restocked_at: row.restocked_at,
            shelf_life_days: row.shelf_life_days,
            expires_at: row.expires_at,
            supplier: row.supplier,
            note: row.note,
        }
    }
}

/// Row for ledger queries
#[derive(Debug, FromRow)]
struct LedgerRow {
    id: i64,
    product_id: Uuid,
    stock_before: Decimal,
    stock_after: Decimal,
    delta: Decimal,
    change_kind: String,
    note: Option<String>,
    loss_category: Option<String>,
    loss_value: Option<Decimal>,
    batch_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for StockLedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> AppResult<Self> {
        let change_kind = ChangeKind::parse(&row.change_kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown change kind: {}", row.change_kind)))?;
        let loss_category = match row.loss_category.as_deref() {
            Some(raw) => Some(LossCategory::parse(raw).ok_or_else(|| {
                AppError::Internal(format!("Unknown loss category: {}", raw))
            })?),
            None => None,
        };
        Ok(StockLedgerEntry {
            id: row.id,
            product_id: row.product_id,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            delta: row.delta,
            change_kind,
            note: row.note,
            loss_category,
            loss_value: row.loss_value,
            batch_id: row.batch_id,
            created_at: row.created_at,
        })
    }
}

/// Row for the product-joined active batch query
#[derive(Debug, FromRow)]
struct ActiveBatchRow {
    #[sqlx(flatten)]
    product: ProductRow,
    batch_id: i64,
    batch_original_qty: Decimal,
    batch_remaining_qty: Decimal,
    batch_restocked_at: DateTime<Utc>,
    batch_shelf_life_days: i32,
    batch_expires_at: DateTime<Utc>,
    batch_supplier: Option<String>,
    batch_note: Option<String>,
}

impl TryFrom<ActiveBatchRow> for (Product, Batch) {
    type Error = AppError;

    fn try_from(row: ActiveBatchRow) -> AppResult<Self> {
        let product = Product::try_from(row.product)?;
        let batch = Batch {
            id: row.batch_id,
            product_id: product.id,
            original_qty: row.batch_original_qty,
            remaining_qty: row.batch_remaining_qty,
            restocked_at: row.batch_restocked_at,
            shelf_life_days: row.batch_shelf_life_days,
            expires_at: row.batch_expires_at,
            supplier: row.batch_supplier,
            note: row.batch_note,
        };
        Ok((product, batch))
    }
}

/// Map errors raised while holding or waiting on a product lock
fn map_lock_error(err: sqlx::Error, product_id: Uuid) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // lock_not_available, serialization_failure, deadlock_detected
            Some("55P03") | Some("40001") | Some("40P01") => {
                return AppError::ConcurrencyConflict(product_id)
            }
            _ => {}
        }
    }
    AppError::Storage(err)
}

impl PgStore {
    pub fn new(db: PgPool, lock_timeout: Duration) -> Self {
        Self { db, lock_timeout }
    }

    /// Run embedded migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn begin_locked(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.db.begin().await?;
        // SET LOCAL takes no bind parameters; the value is an integer we own
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;
        Ok(tx)
    }

    async fn lock_product(
        tx: &mut Transaction<'static, Postgres>,
        product_id: Uuid,
    ) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_lock_error(e, product_id))?
        .ok_or(AppError::UnknownProduct(product_id))?;

        row.try_into()
    }
}

impl InventoryStore for PgStore {
    async fn create_product(&self, product: Product) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (
                id, barcode, name, category, unit_kind, purchase_price, sale_price, stock,
                default_shelf_life_days, warning_lead_days, low_stock_threshold, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $9, $10, $11, $11)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product.id)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.unit_kind.as_str())
        .bind(product.purchase_price)
        .bind(product.sale_price)
        .bind(product.default_shelf_life_days)
        .bind(product.warning_lead_days)
        .bind(product.low_stock_threshold)
        .bind(product.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::DuplicateEntry("barcode".to_string())
            }
            _ => AppError::Storage(e),
        })?;

        row.try_into()
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProductInput,
        now: DateTime<Utc>,
    ) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                category = COALESCE($2, category),
                purchase_price = COALESCE($3, purchase_price),
                sale_price = COALESCE($4, sale_price),
                default_shelf_life_days = COALESCE($5, default_shelf_life_days),
                warning_lead_days = COALESCE($6, warning_lead_days),
                low_stock_threshold = COALESCE($7, low_stock_threshold),
                updated_at = $8
            WHERE id = $9
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&input.name)
        .bind(&input.category)
        .bind(input.purchase_price)
        .bind(input.sale_price)
        .bind(input.default_shelf_life_days)
        .bind(input.warning_lead_days)
        .bind(input.low_stock_threshold)
        .bind(now)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::UnknownProduct(product_id))?;

        row.try_into()
    }

    async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::UnknownProduct(product_id))?;

        row.try_into()
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products ORDER BY name, id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn apply_stock_change(
        &self,
        product_id: Uuid,
        request: StockRequest,
        options: &StockChangeOptions,
        clock: &dyn Clock,
    ) -> AppResult<StockChangeOutcome> {
        let mut tx = self.begin_locked().await?;
        let product = Self::lock_product(&mut tx, product_id).await?;
        let now = clock.now();

        let batches: Vec<Batch> = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {}
            FROM batches
            WHERE product_id = $1 AND remaining_qty > 0
            ORDER BY expires_at ASC, id ASC
            "#,
            BATCH_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_lock_error(e, product_id))?
        .into_iter()
        .map(Batch::from)
        .collect();

        // A rejected plan drops the transaction, which rolls back
        let plan = plan_stock_change(&product, &batches, request, options, now)?;

        let mut created_batch = None;
        let mut draws = Vec::new();
        match plan.mutation {
            BatchMutation::Create(new_batch) => {
                let row = sqlx::query_as::<_, BatchRow>(&format!(
                    r#"
                    INSERT INTO batches (
                        product_id, original_qty, remaining_qty, restocked_at, shelf_life_days,
                        expires_at, supplier, note
                    )
                    VALUES ($1, $2, $2, $3, $4, $5, $6, $7)
                    RETURNING {}
                    "#,
                    BATCH_COLUMNS
                ))
                .bind(new_batch.product_id)
                .bind(new_batch.quantity)
                .bind(new_batch.restocked_at)
                .bind(new_batch.shelf_life_days)
                .bind(new_batch.expires_at)
                .bind(&new_batch.supplier)
                .bind(&new_batch.note)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_lock_error(e, product_id))?;
                created_batch = Some(Batch::from(row));
            }
            BatchMutation::Consume(planned) => {
                for draw in &planned {
                    sqlx::query("UPDATE batches SET remaining_qty = $1 WHERE id = $2")
                        .bind(draw.remaining_after)
                        .bind(draw.batch_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_lock_error(e, product_id))?;
                }
                draws = planned;
            }
        }

        let entry = plan.entry;
        let product_row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET stock = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(entry.stock_after)
        .bind(now)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_lock_error(e, product_id))?;

        let ledger_row = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            INSERT INTO stock_ledger (
                product_id, stock_before, stock_after, delta, change_kind, note,
                loss_category, loss_value, batch_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        ))
        .bind(product_id)
        .bind(entry.stock_before)
        .bind(entry.stock_after)
        .bind(entry.delta)
        .bind(entry.change_kind.as_str())
        .bind(&entry.note)
        .bind(entry.loss_category.map(|c| c.as_str()))
        .bind(entry.loss_value)
        .bind(created_batch.as_ref().map(|b| b.id))
        .bind(entry.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_lock_error(e, product_id))?;

        tx.commit().await.map_err(|e| map_lock_error(e, product_id))?;

        Ok(StockChangeOutcome {
            product: product_row.try_into()?,
            entry: ledger_row.try_into()?,
            created_batch,
            draws,
        })
    }

    async fn list_active_batches(&self) -> AppResult<Vec<(Product, Batch)>> {
        let rows = sqlx::query_as::<_, ActiveBatchRow>(
            r#"
            SELECT p.id, p.barcode, p.name, p.category, p.unit_kind, p.purchase_price,
                   p.sale_price, p.stock, p.default_shelf_life_days, p.warning_lead_days,
                   p.low_stock_threshold, p.created_at, p.updated_at,
                   b.id AS batch_id, b.original_qty AS batch_original_qty,
                   b.remaining_qty AS batch_remaining_qty, b.restocked_at AS batch_restocked_at,
                   b.shelf_life_days AS batch_shelf_life_days, b.expires_at AS batch_expires_at,
                   b.supplier AS batch_supplier, b.note AS batch_note
            FROM batches b
            JOIN products p ON p.id = b.product_id
            WHERE b.remaining_qty > 0
            ORDER BY b.expires_at ASC, b.id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(<(Product, Batch)>::try_from).collect()
    }

    async fn list_history(&self, product_id: Uuid) -> AppResult<Vec<StockLedgerEntry>> {
        // Distinguish an unknown product from an empty ledger
        self.get_product(product_id).await?;

        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {} FROM stock_ledger WHERE product_id = $1 ORDER BY id DESC",
            LEDGER_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockLedgerEntry::try_from).collect()
    }

    async fn list_loss_entries(&self, range: TimeRange) -> AppResult<Vec<StockLedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            SELECT {}
            FROM stock_ledger
            WHERE loss_category IS NOT NULL
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY id ASC
            "#,
            LEDGER_COLUMNS
        ))
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockLedgerEntry::try_from).collect()
    }

    async fn snapshot(&self, product_id: Uuid) -> AppResult<ProductSnapshot> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let product: Product = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::UnknownProduct(product_id))?
        .try_into()?;

        let batches = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM batches WHERE product_id = $1 ORDER BY id ASC",
            BATCH_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Batch::from)
        .collect();

        let entries = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {} FROM stock_ledger WHERE product_id = $1 ORDER BY id ASC",
            LEDGER_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(StockLedgerEntry::try_from)
        .collect::<AppResult<Vec<_>>>()?;

        tx.commit().await?;

        Ok(ProductSnapshot {
            product,
            batches,
            entries,
        })
    }
}
