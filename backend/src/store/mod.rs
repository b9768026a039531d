//! Durable state behind the inventory core
//!
//! A store owns products, batches and the stock ledger. Every stock change
//! runs as one unit under the product's lock: load product and active
//! batches, plan with [`shared::allocation::plan_stock_change`], write batch
//! changes, the new aggregate stock and one ledger entry, then release.
//! Readers never observe a half-applied change.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::allocation::{BatchDraw, StockChangeOptions, StockRequest};
use shared::{Batch, Product, StockLedgerEntry, TimeRange, UpdateProductInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::Clock;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of a committed stock change
#[derive(Debug, Clone, Serialize)]
pub struct StockChangeOutcome {
    /// Product as it stands after the change
    #[serde(rename = "produk")]
    pub product: Product,
    #[serde(rename = "riwayat")]
    pub entry: StockLedgerEntry,
    /// Batch created by an increase
    #[serde(rename = "batch")]
    pub created_batch: Option<Batch>,
    /// Batches drawn from by a decrease, in FIFO order
    #[serde(rename = "alokasi")]
    pub draws: Vec<BatchDraw>,
}

/// A consistent view of one product's full state
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub product: Product,
    /// All batches, exhausted ones included, in creation order
    pub batches: Vec<Batch>,
    /// All ledger entries in id order
    pub entries: Vec<StockLedgerEntry>,
}

/// Storage seam for the inventory core.
///
/// The ledger has no update or delete operation.
pub trait InventoryStore: Clone + Send + Sync + 'static {
    /// Register a product. Fails with `DuplicateEntry` on a reused barcode.
    fn create_product(&self, product: Product) -> impl Future<Output = AppResult<Product>> + Send;

    /// Update product metadata; stock is untouched
    fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProductInput,
        now: DateTime<Utc>,
    ) -> impl Future<Output = AppResult<Product>> + Send;

    fn get_product(&self, product_id: Uuid) -> impl Future<Output = AppResult<Product>> + Send;

    /// All products ordered by name
    fn list_products(&self) -> impl Future<Output = AppResult<Vec<Product>>> + Send;

    /// Plan and commit one stock change atomically. The change is stamped
    /// from `clock` after the product lock is held, so ledger ids and
    /// timestamps of one product advance together.
    fn apply_stock_change(
        &self,
        product_id: Uuid,
        request: StockRequest,
        options: &StockChangeOptions,
        clock: &dyn Clock,
    ) -> impl Future<Output = AppResult<StockChangeOutcome>> + Send;

    /// Every active batch joined with its product
    fn list_active_batches(&self) -> impl Future<Output = AppResult<Vec<(Product, Batch)>>> + Send;

    /// Ledger entries for one product, newest first
    fn list_history(
        &self,
        product_id: Uuid,
    ) -> impl Future<Output = AppResult<Vec<StockLedgerEntry>>> + Send;

    /// Loss-attributed ledger entries created inside `range`
    fn list_loss_entries(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = AppResult<Vec<StockLedgerEntry>>> + Send;

    /// Product, batches and ledger read as one consistent unit
    fn snapshot(&self, product_id: Uuid) -> impl Future<Output = AppResult<ProductSnapshot>> + Send;
}

/// Store selected at startup from configuration
#[derive(Clone)]
pub enum StoreBackend {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Postgres(_) => "postgres",
            StoreBackend::Memory(_) => "memory",
        }
    }

    /// Whether the backing storage is reachable
    pub async fn is_healthy(&self) -> bool {
        match self {
            StoreBackend::Postgres(store) => store.ping().await.is_ok(),
            StoreBackend::Memory(_) => true,
        }
    }
}

impl InventoryStore for StoreBackend {
    async fn create_product(&self, product: Product) -> AppResult<Product> {
        match self {
            StoreBackend::Postgres(store) => store.create_product(product).await,
            StoreBackend::Memory(store) => store.create_product(product).await,
        }
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProductInput,
        now: DateTime<Utc>,
    ) -> AppResult<Product> {
        match self {
            StoreBackend::Postgres(store) => store.update_product(product_id, input, now).await,
            StoreBackend::Memory(store) => store.update_product(product_id, input, now).await,
        }
    }

    async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        match self {
            StoreBackend::Postgres(store) => store.get_product(product_id).await,
            StoreBackend::Memory(store) => store.get_product(product_id).await,
        }
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        match self {
            StoreBackend::Postgres(store) => store.list_products().await,
            StoreBackend::Memory(store) => store.list_products().await,
        }
    }

    async fn apply_stock_change(
        &self,
        product_id: Uuid,
        request: StockRequest,
        options: &StockChangeOptions,
        clock: &dyn Clock,
    ) -> AppResult<StockChangeOutcome> {
        match self {
            StoreBackend::Postgres(store) => {
                store
                    .apply_stock_change(product_id, request, options, clock)
                    .await
            }
            StoreBackend::Memory(store) => {
                store
                    .apply_stock_change(product_id, request, options, clock)
                    .await
            }
        }
    }

    async fn list_active_batches(&self) -> AppResult<Vec<(Product, Batch)>> {
        match self {
            StoreBackend::Postgres(store) => store.list_active_batches().await,
            StoreBackend::Memory(store) => store.list_active_batches().await,
        }
    }

    async fn list_history(&self, product_id: Uuid) -> AppResult<Vec<StockLedgerEntry>> {
        match self {
            StoreBackend::Postgres(store) => store.list_history(product_id).await,
            StoreBackend::Memory(store) => store.list_history(product_id).await,
        }
    }

    async fn list_loss_entries(&self, range: TimeRange) -> AppResult<Vec<StockLedgerEntry>> {
        match self {
            StoreBackend::Postgres(store) => store.list_loss_entries(range).await,
            StoreBackend::Memory(store) => store.list_loss_entries(range).await,
        }
    }

    async fn snapshot(&self, product_id: Uuid) -> AppResult<ProductSnapshot> {
        match self {
            StoreBackend::Postgres(store) => store.snapshot(product_id).await,
            StoreBackend::Memory(store) => store.snapshot(product_id).await,
        }
    }
}
