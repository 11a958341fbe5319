//! Test fixtures: in-memory stores, hierarchy builders and a store wrapper
//! that injects failures.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use taxon_core::tax::resolve;
use taxon_core::total::compute_total;
use taxon_core::{
    Category, CategoryTax, Item, ItemFilter, Money, Page, Paged, SubCategory, TaxRate, TaxSettings,
};
use taxon_db::{
    generate_id, Database, DbConfig, DbError, DbResult, HierarchyStore, ItemPatch, StoreTransaction,
    TotalBasis,
};

/// Routes engine logs to the test harness. Safe to call from every test.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("taxon_cascade=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub(crate) async fn memory_store() -> Arc<dyn HierarchyStore> {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Arc::new(db.store())
}

pub(crate) async fn category(store: &Arc<dyn HierarchyStore>, name: &str, tax: CategoryTax) -> Category {
    let now = Utc::now();
    let mut category = Category {
        id: generate_id(),
        name: name.to_string(),
        image: format!("https://img.test/{}.png", name),
        description: name.to_string(),
        tax_applicable: false,
        tax_rate: TaxRate::zero(),
        tax_type: None,
        created_at: now,
        updated_at: now,
    };
    category.set_tax(tax);
    store.insert_category(&category).await.unwrap();
    category
}

pub(crate) async fn sub_category(
    store: &Arc<dyn HierarchyStore>,
    category: &Category,
    name: &str,
    tax: TaxSettings,
) -> SubCategory {
    let now = Utc::now();
    let sub_category = SubCategory {
        id: generate_id(),
        name: name.to_string(),
        image: format!("https://img.test/{}.png", name),
        description: name.to_string(),
        category_id: category.id.clone(),
        tax,
        created_at: now,
        updated_at: now,
    };
    store.insert_sub_category(&sub_category).await.unwrap();
    sub_category
}

/// Inserts an item with a consistent total.
pub(crate) async fn item_under(
    store: &Arc<dyn HierarchyStore>,
    category: &Category,
    sub_category: Option<&SubCategory>,
    base_amount_cents: i64,
    tax: TaxSettings,
) -> Item {
    let mut ancestors = Vec::with_capacity(2);
    if let Some(sub_category) = sub_category {
        ancestors.push(sub_category.tax);
    }
    ancestors.push(category.tax_settings());

    let descriptor = resolve(&tax, &ancestors);
    let totals = compute_total(Money::from_cents(base_amount_cents), Money::zero(), &descriptor).unwrap();

    let now = Utc::now();
    let item = Item {
        id: generate_id(),
        name: format!("item-{}", base_amount_cents),
        image: "https://img.test/item.png".to_string(),
        description: "test item".to_string(),
        category_id: category.id.clone(),
        sub_category_id: sub_category.map(|s| s.id.clone()),
        base_amount_cents,
        discount_cents: 0,
        tax,
        total_amount_cents: totals.total_amount.cents(),
        created_at: now,
        updated_at: now,
    };
    store.insert_item(&item).await.unwrap();
    item
}

// =============================================================================
// Fault Injection
// =============================================================================

/// A change applied to the wrapped store from inside another write.
pub(crate) type ConcurrentChange =
    Box<dyn FnOnce(Arc<dyn HierarchyStore>) -> BoxFuture<'static, ()> + Send>;

/// Delegating store whose item writes can be made to fail, hang or race a
/// concurrent change, and whose subcategories can be hidden from lookups.
pub(crate) struct FaultyStore {
    inner: Arc<dyn HierarchyStore>,
    failing_updates: Mutex<HashSet<String>>,
    stalled_updates: Mutex<HashSet<String>>,
    hidden_sub_categories: Mutex<HashSet<String>>,
    interleaved: Mutex<HashMap<String, Vec<ConcurrentChange>>>,
}

impl FaultyStore {
    pub(crate) fn new(inner: Arc<dyn HierarchyStore>) -> Self {
        Self {
            inner,
            failing_updates: Mutex::new(HashSet::new()),
            stalled_updates: Mutex::new(HashSet::new()),
            hidden_sub_categories: Mutex::new(HashSet::new()),
            interleaved: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped store, without any injected faults.
    pub(crate) fn inner_store(&self) -> Arc<dyn HierarchyStore> {
        self.inner.clone()
    }

    pub(crate) fn fail_update(&self, item_id: &str) {
        self.failing_updates.lock().unwrap().insert(item_id.to_string());
    }

    /// The update never completes.
    pub(crate) fn stall_update(&self, item_id: &str) {
        self.stalled_updates.lock().unwrap().insert(item_id.to_string());
    }

    pub(crate) fn hide_sub_category(&self, id: &str) {
        self.hidden_sub_categories.lock().unwrap().insert(id.to_string());
    }

    /// Runs `change` against the wrapped store right before the next write
    /// to `item_id`, as if another request committed in between. Queued
    /// changes run one per write, in order.
    pub(crate) fn interleave_before_write<F>(&self, item_id: &str, change: F)
    where
        F: FnOnce(Arc<dyn HierarchyStore>) -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.interleaved
            .lock()
            .unwrap()
            .entry(item_id.to_string())
            .or_default()
            .push(Box::new(change));
    }

    /// Injected faults for a write to `id`, then any queued concurrent change.
    async fn before_write(&self, id: &str) -> DbResult<()> {
        let fail = self.failing_updates.lock().unwrap().contains(id);
        if fail {
            return Err(DbError::QueryFailed(format!("injected failure for {}", id)));
        }

        let stall = self.stalled_updates.lock().unwrap().contains(id);
        if stall {
            std::future::pending::<()>().await;
        }

        let change = self
            .interleaved
            .lock()
            .unwrap()
            .get_mut(id)
            .filter(|queue| !queue.is_empty())
            .map(|queue| queue.remove(0));
        if let Some(change) = change {
            change(self.inner.clone()).await;
        }

        Ok(())
    }
}

#[async_trait]
impl HierarchyStore for FaultyStore {
    async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        self.inner.get_category(id).await
    }

    async fn get_sub_category(&self, id: &str) -> DbResult<Option<SubCategory>> {
        let hidden = self.hidden_sub_categories.lock().unwrap().contains(id);
        if hidden {
            return Ok(None);
        }
        self.inner.get_sub_category(id).await
    }

    async fn get_item(&self, id: &str) -> DbResult<Option<Item>> {
        self.inner.get_item(id).await
    }

    async fn find_sub_categories_by_category(&self, category_id: &str) -> DbResult<Vec<SubCategory>> {
        self.inner.find_sub_categories_by_category(category_id).await
    }

    async fn find_items_by_category(&self, category_id: &str) -> DbResult<Vec<Item>> {
        self.inner.find_items_by_category(category_id).await
    }

    async fn find_items_by_sub_category(&self, sub_category_id: &str) -> DbResult<Vec<Item>> {
        self.inner.find_items_by_sub_category(sub_category_id).await
    }

    async fn count_items_by_category(&self, category_id: &str) -> DbResult<u64> {
        self.inner.count_items_by_category(category_id).await
    }

    async fn count_items_by_sub_category(&self, sub_category_id: &str) -> DbResult<u64> {
        self.inner.count_items_by_sub_category(sub_category_id).await
    }

    async fn update_item(&self, id: &str, patch: &ItemPatch) -> DbResult<Item> {
        self.before_write(id).await?;
        self.inner.update_item(id, patch).await
    }

    async fn write_item_total(&self, id: &str, basis: &TotalBasis, total: Money) -> DbResult<bool> {
        self.before_write(id).await?;
        self.inner.write_item_total(id, basis, total).await
    }

    async fn list_items(&self, filter: &ItemFilter, page: Page) -> DbResult<Paged<Item>> {
        self.inner.list_items(filter, page).await
    }

    async fn list_categories(&self, page: Page) -> DbResult<Paged<Category>> {
        self.inner.list_categories(page).await
    }

    async fn insert_category(&self, category: &Category) -> DbResult<()> {
        self.inner.insert_category(category).await
    }

    async fn update_category(&self, category: &Category) -> DbResult<()> {
        self.inner.update_category(category).await
    }

    async fn insert_sub_category(&self, sub_category: &SubCategory) -> DbResult<()> {
        self.inner.insert_sub_category(sub_category).await
    }

    async fn update_sub_category(&self, sub_category: &SubCategory) -> DbResult<()> {
        self.inner.update_sub_category(sub_category).await
    }

    async fn insert_item(&self, item: &Item) -> DbResult<()> {
        self.inner.insert_item(item).await
    }

    async fn delete_item(&self, id: &str) -> DbResult<()> {
        self.inner.delete_item(id).await
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        self.inner.begin().await
    }
}

// =============================================================================
// Concurrent Changes
// =============================================================================

/// Another request edits the item's amounts and stores the total it
/// computed for them.
pub(crate) fn amount_edit(
    item_id: &str,
    base_amount_cents: i64,
    total_amount_cents: i64,
) -> impl FnOnce(Arc<dyn HierarchyStore>) -> BoxFuture<'static, ()> + Send + 'static {
    let item_id = item_id.to_string();
    move |store| {
        async move {
            let patch = ItemPatch {
                base_amount_cents: Some(base_amount_cents),
                total_amount_cents: Some(total_amount_cents),
                ..ItemPatch::default()
            };
            store.update_item(&item_id, &patch).await.unwrap();
        }
        .boxed()
    }
}

/// Another request changes a category's tax without cascading.
pub(crate) fn category_tax_edit(
    category: &Category,
    tax: CategoryTax,
) -> impl FnOnce(Arc<dyn HierarchyStore>) -> BoxFuture<'static, ()> + Send + 'static {
    let mut category = category.clone();
    category.set_tax(tax);
    move |store| {
        async move {
            store.update_category(&category).await.unwrap();
        }
        .boxed()
    }
}
