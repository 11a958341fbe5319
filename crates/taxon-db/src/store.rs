//! # Hierarchy Store
//!
//! The storage seam between the cascade engine and the database.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Store Interface                                 │
//! │                                                                         │
//! │  Arc<dyn HierarchyStore>                                               │
//! │  ├── point reads        get_category / get_sub_category / get_item     │
//! │  ├── enumeration        find_sub_categories_by_category                │
//! │  │                      find_items_by_category / _by_sub_category      │
//! │  ├── reference counts   count_items_by_category / _by_sub_category     │
//! │  ├── listings           list_items(filter, page) / list_categories     │
//! │  ├── writes             insert_* / update_* / update_item / delete_item│
//! │  │                      write_item_total (conditioned on TotalBasis)   │
//! │  └── begin() ──► Box<dyn StoreTransaction>                             │
//! │                   ├── counts / finds inside the transaction            │
//! │                   ├── clear_sub_category_items                         │
//! │                   ├── delete_sub_category / delete_category            │
//! │                   └── commit(self)   (drop = rollback)                 │
//! │                                                                         │
//! │  SqliteStore / SqliteTransaction implement both over sqlx              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call is a suspension point. Nothing above this module knows that
//! the store is SQLite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{category, item, sub_category};
use taxon_core::{
    Category, EntityKind, Item, ItemFilter, Money, Page, Paged, SubCategory, TaxSettings,
};

// =============================================================================
// Item Patch
// =============================================================================

/// Partial item update. `None` leaves a column untouched.
///
/// Parent references are not patchable; moving items between parents only
/// happens through [`StoreTransaction::clear_sub_category_items`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub base_amount_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub tax: Option<TaxSettings>,
    pub total_amount_cents: Option<i64>,
}

impl ItemPatch {
    /// Patch that only rewrites the stored total (what a cascade writes).
    pub fn total(total: Money) -> Self {
        ItemPatch {
            total_amount_cents: Some(total.cents()),
            ..ItemPatch::default()
        }
    }

    /// Number of fields set.
    pub fn field_count(&self) -> usize {
        [
            self.name.is_some(),
            self.image.is_some(),
            self.description.is_some(),
            self.base_amount_cents.is_some(),
            self.discount_cents.is_some(),
            self.tax.is_some(),
            self.total_amount_cents.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

// =============================================================================
// Total Basis
// =============================================================================

/// The stored columns an item total is computed from.
///
/// A total write conditioned on a basis only lands while the row still
/// holds these values, so a concurrent amount or tax edit is never paired
/// with a total computed from the old ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalBasis {
    pub base_amount_cents: i64,
    pub discount_cents: i64,
    pub tax: TaxSettings,
}

impl TotalBasis {
    pub fn of(item: &Item) -> Self {
        TotalBasis {
            base_amount_cents: item.base_amount_cents,
            discount_cents: item.discount_cents,
            tax: item.tax,
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Reads, writes and transactions over the catalog hierarchy.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    async fn get_category(&self, id: &str) -> DbResult<Option<Category>>;

    async fn get_sub_category(&self, id: &str) -> DbResult<Option<SubCategory>>;

    async fn get_item(&self, id: &str) -> DbResult<Option<Item>>;

    async fn find_sub_categories_by_category(&self, category_id: &str)
        -> DbResult<Vec<SubCategory>>;

    /// Every item of the category, including those under its subcategories.
    async fn find_items_by_category(&self, category_id: &str) -> DbResult<Vec<Item>>;

    async fn find_items_by_sub_category(&self, sub_category_id: &str) -> DbResult<Vec<Item>>;

    /// Items anywhere under the category.
    async fn count_items_by_category(&self, category_id: &str) -> DbResult<u64>;

    async fn count_items_by_sub_category(&self, sub_category_id: &str) -> DbResult<u64>;

    /// Applies `patch` and returns the stored item. `NotFound` if missing.
    async fn update_item(&self, id: &str, patch: &ItemPatch) -> DbResult<Item>;

    /// Writes `total` only while the item still matches `basis`.
    ///
    /// ## Returns
    /// * `Ok(true)` - Total written
    /// * `Ok(false)` - Amounts or tax changed since `basis` was read
    /// * `Err(DbError::NotFound)` - Item doesn't exist
    async fn write_item_total(&self, id: &str, basis: &TotalBasis, total: Money) -> DbResult<bool>;

    /// One page of items matching `filter`, in insertion order.
    async fn list_items(&self, filter: &ItemFilter, page: Page) -> DbResult<Paged<Item>>;

    /// One page of categories ordered by name.
    async fn list_categories(&self, page: Page) -> DbResult<Paged<Category>>;

    async fn insert_category(&self, category: &Category) -> DbResult<()>;

    async fn update_category(&self, category: &Category) -> DbResult<()>;

    async fn insert_sub_category(&self, sub_category: &SubCategory) -> DbResult<()>;

    async fn update_sub_category(&self, sub_category: &SubCategory) -> DbResult<()>;

    async fn insert_item(&self, item: &Item) -> DbResult<()>;

    async fn delete_item(&self, id: &str) -> DbResult<()>;

    /// Opens a transaction. Dropping the handle without `commit` aborts it.
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>>;
}

/// Scoped multi-row transaction used by the deletion guard.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn count_items_by_category(&mut self, category_id: &str) -> DbResult<u64>;

    async fn count_items_by_sub_category(&mut self, sub_category_id: &str) -> DbResult<u64>;

    async fn find_sub_categories_by_category(
        &mut self,
        category_id: &str,
    ) -> DbResult<Vec<SubCategory>>;

    async fn find_items_by_sub_category(&mut self, sub_category_id: &str) -> DbResult<Vec<Item>>;

    /// Re-parents every item of the subcategory onto its category.
    async fn clear_sub_category_items(&mut self, sub_category_id: &str) -> DbResult<u64>;

    /// `NotFound` if no row was deleted.
    async fn delete_sub_category(&mut self, id: &str) -> DbResult<()>;

    /// Deletes the category and all of its subcategories. Returns the number
    /// of subcategories removed. `NotFound` if the category row is missing.
    async fn delete_category(&mut self, id: &str) -> DbResult<u64>;

    async fn commit(self: Box<Self>) -> DbResult<()>;
}

// =============================================================================
// SQLite Store
// =============================================================================

/// `HierarchyStore` over a [`Database`] pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl HierarchyStore for SqliteStore {
    async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        self.db.categories().get_by_id(id).await
    }

    async fn get_sub_category(&self, id: &str) -> DbResult<Option<SubCategory>> {
        self.db.sub_categories().get_by_id(id).await
    }

    async fn get_item(&self, id: &str) -> DbResult<Option<Item>> {
        self.db.items().get_by_id(id).await
    }

    async fn find_sub_categories_by_category(
        &self,
        category_id: &str,
    ) -> DbResult<Vec<SubCategory>> {
        self.db.sub_categories().find_by_category(category_id).await
    }

    async fn find_items_by_category(&self, category_id: &str) -> DbResult<Vec<Item>> {
        self.db.items().find_by_category(category_id).await
    }

    async fn find_items_by_sub_category(&self, sub_category_id: &str) -> DbResult<Vec<Item>> {
        self.db.items().find_by_sub_category(sub_category_id).await
    }

    async fn count_items_by_category(&self, category_id: &str) -> DbResult<u64> {
        self.db.items().count_by_category(category_id).await
    }

    async fn count_items_by_sub_category(&self, sub_category_id: &str) -> DbResult<u64> {
        self.db.items().count_by_sub_category(sub_category_id).await
    }

    async fn update_item(&self, id: &str, patch: &ItemPatch) -> DbResult<Item> {
        self.db.items().update(id, patch).await
    }

    async fn write_item_total(&self, id: &str, basis: &TotalBasis, total: Money) -> DbResult<bool> {
        self.db.items().update_total(id, basis, total).await
    }

    async fn list_items(&self, filter: &ItemFilter, page: Page) -> DbResult<Paged<Item>> {
        self.db.items().list(filter, page).await
    }

    async fn list_categories(&self, page: Page) -> DbResult<Paged<Category>> {
        self.db.categories().list(page).await
    }

    async fn insert_category(&self, category: &Category) -> DbResult<()> {
        self.db.categories().insert(category).await
    }

    async fn update_category(&self, category: &Category) -> DbResult<()> {
        self.db.categories().update(category).await
    }

    async fn insert_sub_category(&self, sub_category: &SubCategory) -> DbResult<()> {
        self.db.sub_categories().insert(sub_category).await
    }

    async fn update_sub_category(&self, sub_category: &SubCategory) -> DbResult<()> {
        self.db.sub_categories().update(sub_category).await
    }

    async fn insert_item(&self, item: &Item) -> DbResult<()> {
        self.db.items().insert(item).await
    }

    async fn delete_item(&self, id: &str) -> DbResult<()> {
        self.db.items().delete(id).await
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!("Store transaction started");
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

// =============================================================================
// SQLite Transaction
// =============================================================================

/// Owns a `sqlx` transaction. sqlx rolls back on drop, so any early return
/// in the caller aborts every write made through this handle.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn count_items_by_category(&mut self, category_id: &str) -> DbResult<u64> {
        item::count_by_category(&mut *self.tx, category_id).await
    }

    async fn count_items_by_sub_category(&mut self, sub_category_id: &str) -> DbResult<u64> {
        item::count_by_sub_category(&mut *self.tx, sub_category_id).await
    }

    async fn find_sub_categories_by_category(
        &mut self,
        category_id: &str,
    ) -> DbResult<Vec<SubCategory>> {
        sub_category::find_by_category(&mut *self.tx, category_id).await
    }

    async fn find_items_by_sub_category(&mut self, sub_category_id: &str) -> DbResult<Vec<Item>> {
        item::find_by_sub_category(&mut *self.tx, sub_category_id).await
    }

    async fn clear_sub_category_items(&mut self, sub_category_id: &str) -> DbResult<u64> {
        item::clear_sub_category(&mut *self.tx, sub_category_id).await
    }

    async fn delete_sub_category(&mut self, id: &str) -> DbResult<()> {
        let deleted = sub_category::delete(&mut *self.tx, id).await?;
        if deleted == 0 {
            return Err(DbError::not_found(EntityKind::SubCategory, id));
        }
        Ok(())
    }

    async fn delete_category(&mut self, id: &str) -> DbResult<u64> {
        let sub_categories = sub_category::delete_by_category(&mut *self.tx, id).await?;
        let deleted = category::delete(&mut *self.tx, id).await?;
        if deleted == 0 {
            return Err(DbError::not_found(EntityKind::Category, id));
        }
        Ok(sub_categories)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!("Store transaction committed");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::repository::generate_id;
    use chrono::Utc;
    use std::sync::Arc;
    use taxon_core::{TaxRate, TaxType};

    async fn store_with_category() -> (Arc<dyn HierarchyStore>, Category) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: Arc<dyn HierarchyStore> = Arc::new(db.store());

        let now = Utc::now();
        let category = Category {
            id: generate_id(),
            name: "Garden".to_string(),
            image: "https://img/garden.png".to_string(),
            description: "Outdoor".to_string(),
            tax_applicable: true,
            tax_rate: TaxRate::from_bps(500),
            tax_type: Some(TaxType::Percentage),
            created_at: now,
            updated_at: now,
        };
        store.insert_category(&category).await.unwrap();
        (store, category)
    }

    fn sub_category(category_id: &str, name: &str) -> SubCategory {
        let now = Utc::now();
        SubCategory {
            id: generate_id(),
            name: name.to_string(),
            image: "https://img/sub.png".to_string(),
            description: "Sub".to_string(),
            category_id: category_id.to_string(),
            tax: TaxSettings::inherit(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_field_count() {
        assert!(ItemPatch::default().is_empty());
        assert_eq!(ItemPatch::total(Money::from_cents(10)).field_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (store, category) = store_with_category().await;
        let tools = sub_category(&category.id, "Tools");
        store.insert_sub_category(&tools).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.delete_category(&category.id).await.unwrap();
            // dropped without commit
        }

        assert!(store.get_category(&category.id).await.unwrap().is_some());
        assert!(store.get_sub_category(&tools.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_committed_category_delete_removes_sub_categories() {
        let (store, category) = store_with_category().await;
        store
            .insert_sub_category(&sub_category(&category.id, "Seeds"))
            .await
            .unwrap();
        store
            .insert_sub_category(&sub_category(&category.id, "Pots"))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.count_items_by_category(&category.id).await.unwrap(), 0);
        let removed = tx.delete_category(&category.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(removed, 2);
        assert!(store.get_category(&category.id).await.unwrap().is_none());
        assert!(store
            .find_sub_categories_by_category(&category.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_sub_category_in_transaction() {
        let (store, _category) = store_with_category().await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.delete_sub_category("missing").await.unwrap_err();

        assert!(matches!(
            err,
            DbError::NotFound {
                entity: EntityKind::SubCategory,
                ..
            }
        ));
    }
}
