//! In-process inventory store
//!
//! Each product's state (aggregate, batches, ledger) sits behind its own
//! mutex. Writers and readers of one product take that mutex, so a reader
//! sees either the complete before-state or the complete after-state of a
//! stock change. Different products never contend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::allocation::{
    apply_draws, plan_stock_change, BatchMutation, StockChangeOptions, StockRequest,
};
use shared::{Batch, Product, StockLedgerEntry, TimeRange, UpdateProductInput};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use super::{InventoryStore, ProductSnapshot, StockChangeOutcome};
use crate::error::{AppError, AppResult};
use crate::services::Clock;

#[derive(Debug)]
struct ProductState {
    product: Product,
    batches: Vec<Batch>,
    ledger: Vec<StockLedgerEntry>,
}

/// Product slots plus the barcodes in use. Barcodes are fixed at registration.
#[derive(Default)]
struct Catalog {
    slots: HashMap<Uuid, Arc<Mutex<ProductState>>>,
    barcodes: HashSet<String>,
}

struct Inner {
    catalog: RwLock<Catalog>,
    next_batch_id: AtomicI64,
    next_entry_id: AtomicI64,
    lock_timeout: Duration,
}

/// Inventory store kept in memory, used for tests and single-node demos
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog: RwLock::new(Catalog::default()),
                next_batch_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }

    async fn slot(&self, product_id: Uuid) -> AppResult<Arc<Mutex<ProductState>>> {
        self.inner
            .catalog
            .read()
            .await
            .slots
            .get(&product_id)
            .cloned()
            .ok_or(AppError::UnknownProduct(product_id))
    }

    async fn all_slots(&self) -> Vec<Arc<Mutex<ProductState>>> {
        self.inner.catalog.read().await.slots.values().cloned().collect()
    }

    async fn lock<'a>(
        &self,
        product_id: Uuid,
        slot: &'a Mutex<ProductState>,
    ) -> AppResult<MutexGuard<'a, ProductState>> {
        tokio::time::timeout(self.inner.lock_timeout, slot.lock())
            .await
            .map_err(|_| AppError::ConcurrencyConflict(product_id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl InventoryStore for MemoryStore {
    async fn create_product(&self, product: Product) -> AppResult<Product> {
        let mut catalog = self.inner.catalog.write().await;
        if !catalog.barcodes.insert(product.barcode.clone()) {
            return Err(AppError::DuplicateEntry("barcode".to_string()));
        }
        catalog.slots.insert(
            product.id,
            Arc::new(Mutex::new(ProductState {
                product: product.clone(),
                batches: Vec::new(),
                ledger: Vec::new(),
            })),
        );

        Ok(product)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProductInput,
        now: DateTime<Utc>,
    ) -> AppResult<Product> {
        let slot = self.slot(product_id).await?;
        let mut state = self.lock(product_id, &slot).await?;
        input.apply_to(&mut state.product, now);
        Ok(state.product.clone())
    }

    async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        let slot = self.slot(product_id).await?;
        let state = self.lock(product_id, &slot).await?;
        Ok(state.product.clone())
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let mut products = Vec::new();
        for slot in self.all_slots().await {
            let state = slot.lock().await;
            products.push(state.product.clone());
        }
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn apply_stock_change(
        &self,
        product_id: Uuid,
        request: StockRequest,
        options: &StockChangeOptions,
        clock: &dyn Clock,
    ) -> AppResult<StockChangeOutcome> {
        let slot = self.slot(product_id).await?;
        let mut state = self.lock(product_id, &slot).await?;
        let now = clock.now();

        // Nothing below the plan can fail, so a rejected plan leaves state untouched
        let plan = plan_stock_change(&state.product, &state.batches, request, options, now)?;

        let mut created_batch = None;
        let mut draws = Vec::new();
        match plan.mutation {
            BatchMutation::Create(new_batch) => {
                let id = self.inner.next_batch_id.fetch_add(1, Ordering::SeqCst);
                let batch = new_batch.into_batch(id);
                state.batches.push(batch.clone());
                created_batch = Some(batch);
            }
            BatchMutation::Consume(planned) => {
                apply_draws(&mut state.batches, &planned);
                draws = planned;
            }
        }

        let new_entry = plan.entry;
        state.product.stock = new_entry.stock_after;
        state.product.updated_at = now;

        let entry = StockLedgerEntry {
            id: self.inner.next_entry_id.fetch_add(1, Ordering::SeqCst),
            product_id,
            stock_before: new_entry.stock_before,
            stock_after: new_entry.stock_after,
            delta: new_entry.delta,
            change_kind: new_entry.change_kind,
            note: new_entry.note,
            loss_category: new_entry.loss_category,
            loss_value: new_entry.loss_value,
            batch_id: created_batch.as_ref().map(|b| b.id),
            created_at: new_entry.created_at,
        };
        state.ledger.push(entry.clone());

        Ok(StockChangeOutcome {
            product: state.product.clone(),
            entry,
            created_batch,
            draws,
        })
    }

    async fn list_active_batches(&self) -> AppResult<Vec<(Product, Batch)>> {
        let mut rows = Vec::new();
        for slot in self.all_slots().await {
            let state = slot.lock().await;
            rows.extend(
                state
                    .batches
                    .iter()
                    .filter(|b| b.is_active())
                    .map(|b| (state.product.clone(), b.clone())),
            );
        }
        Ok(rows)
    }

    async fn list_history(&self, product_id: Uuid) -> AppResult<Vec<StockLedgerEntry>> {
        let slot = self.slot(product_id).await?;
        let state = self.lock(product_id, &slot).await?;
        let mut entries = state.ledger.clone();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    async fn list_loss_entries(&self, range: TimeRange) -> AppResult<Vec<StockLedgerEntry>> {
        let mut entries = Vec::new();
        for slot in self.all_slots().await {
            let state = slot.lock().await;
            entries.extend(
                state
                    .ledger
                    .iter()
                    .filter(|e| e.loss_category.is_some() && range.contains(e.created_at))
                    .cloned(),
            );
        }
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn snapshot(&self, product_id: Uuid) -> AppResult<ProductSnapshot> {
        let slot = self.slot(product_id).await?;
        let state = self.lock(product_id, &slot).await?;
        Ok(ProductSnapshot {
            product: state.product.clone(),
            batches: state.batches.clone(),
            entries: state.ledger.clone(),
        })
    }
}
