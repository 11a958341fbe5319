//! # Catalog Service
//!
//! Entry point for the request layer. Each command validates its input,
//! persists through the [`HierarchyStore`], keeps the tax cache honest and
//! triggers cascades when a parent's tax changes.
//!
//! ## Command Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  create_item ──► validate ──► resolve parents ──► resolve tax          │
//! │                  ──► compute total ──► insert ──► settle                │
//! │                                                                         │
//! │  update_item ──► validate ──► compute total ──► patch ──► settle        │
//! │      settle: re-resolve against the committed parents and rewrite the   │
//! │      total if a parent changed while the item was being written         │
//! │                                                                         │
//! │  list_items / list_categories / per-parent listings ──► Paged<T>        │
//! │                                                                         │
//! │  update_category / update_sub_category                                  │
//! │      ──► validate ──► persist ──► tax changed? ──► CascadePropagator    │
//! │                                    │                                    │
//! │                                    └─ report returned with the entity   │
//! │                                                                         │
//! │  delete_* ──► DeletionGuard (one transaction)                           │
//! │      subcategory reassigned items ──► recompute after commit            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cascade never rolls back the change that triggered it. Partial cascades
//! come back as a report whose [`Updated::warning`] is `IncompleteCascade`.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::TaxCache;
use crate::config::CascadeConfig;
use crate::error::{CascadeError, CascadeResult};
use crate::guard::{CategoryDeletion, DeletionGuard, SubCategoryDeletion};
use crate::propagator::CascadePropagator;
use crate::report::{CascadeReport, CascadeTrigger};
use crate::resolver::TaxResolver;
use taxon_core::total::compute_total;
use taxon_core::validation::{
    validate_category_tax, validate_name, validate_new_category, validate_new_item,
    validate_new_sub_category, validate_required, validate_tax_settings,
};
use taxon_core::{
    Category, CategoryChanges, EntityKind, Item, ItemChanges, ItemFilter, NewCategory, NewItem,
    NewSubCategory, Page, Paged, Resolution, SubCategory, SubCategoryChanges, TaxDescriptor,
    TaxRate,
};
use taxon_db::{generate_id, HierarchyStore, ItemPatch};

// =============================================================================
// Outcomes
// =============================================================================

/// A committed change plus the cascade it triggered, if any.
#[derive(Debug, Clone, Serialize)]
pub struct Updated<T> {
    pub entity: T,
    pub cascade: Option<CascadeReport>,
}

impl<T> Updated<T> {
    fn plain(entity: T) -> Self {
        Updated {
            entity,
            cascade: None,
        }
    }

    /// `IncompleteCascade` when the triggered cascade did not finish.
    pub fn warning(&self) -> Option<CascadeError> {
        self.cascade.as_ref().and_then(CascadeReport::warning)
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub struct Catalog {
    store: Arc<dyn HierarchyStore>,
    cache: TaxCache,
    resolver: TaxResolver,
    propagator: CascadePropagator,
    guard: DeletionGuard,
    config: CascadeConfig,
}

impl Catalog {
    /// Builds the service with its own cache sized from `config`.
    pub fn new(store: Arc<dyn HierarchyStore>, config: CascadeConfig) -> Self {
        let cache = TaxCache::new(config.cache_ttl());
        Self::with_cache(store, cache, config)
    }

    /// Builds the service around a cache shared with other components.
    pub fn with_cache(store: Arc<dyn HierarchyStore>, cache: TaxCache, config: CascadeConfig) -> Self {
        let resolver = TaxResolver::new(store.clone(), cache.clone());
        let propagator = CascadePropagator::new(store.clone(), cache.clone(), &config);
        let guard = DeletionGuard::new(store.clone(), config.sub_category_policy());

        Self {
            store,
            cache,
            resolver,
            propagator,
            guard,
            config,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn cache(&self) -> &TaxCache {
        &self.cache
    }

    pub fn propagator(&self) -> &CascadePropagator {
        &self.propagator
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_category(&self, id: &str) -> CascadeResult<Category> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| CascadeError::not_found(EntityKind::Category, id))
    }

    pub async fn get_sub_category(&self, id: &str) -> CascadeResult<SubCategory> {
        self.store
            .get_sub_category(id)
            .await?
            .ok_or_else(|| CascadeError::not_found(EntityKind::SubCategory, id))
    }

    pub async fn get_item(&self, id: &str) -> CascadeResult<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| CascadeError::not_found(EntityKind::Item, id))
    }

    /// Effective tax of an item (cached).
    pub async fn effective_tax(&self, item_id: &str) -> CascadeResult<TaxDescriptor> {
        self.resolver.effective_tax(item_id).await
    }

    /// Effective tax of a subcategory and which level decided it.
    pub async fn sub_category_tax(&self, id: &str) -> CascadeResult<Resolution> {
        let sub_category = self.get_sub_category(id).await?;
        self.resolver.resolve_sub_category(&sub_category).await
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Items matching `filter`, one page at a time. An empty page is not an
    /// error.
    ///
    /// ## Errors
    /// * `Validation` - negative or inverted price bounds
    pub async fn list_items(&self, filter: ItemFilter, page: Page) -> CascadeResult<Paged<Item>> {
        filter.validate()?;
        Ok(self.store.list_items(&filter, page.normalized()).await?)
    }

    pub async fn list_categories(&self, page: Page) -> CascadeResult<Paged<Category>> {
        Ok(self.store.list_categories(page.normalized()).await?)
    }

    /// Subcategories of a category. `NotFound` if the category is missing.
    pub async fn list_sub_categories(&self, category_id: &str) -> CascadeResult<Vec<SubCategory>> {
        self.get_category(category_id).await?;
        Ok(self.store.find_sub_categories_by_category(category_id).await?)
    }

    /// Every item of a category, with or without a subcategory.
    pub async fn category_items(&self, category_id: &str, page: Page) -> CascadeResult<Paged<Item>> {
        self.get_category(category_id).await?;
        self.list_items(ItemFilter::in_category(category_id), page).await
    }

    pub async fn sub_category_items(
        &self,
        sub_category_id: &str,
        page: Page,
    ) -> CascadeResult<Paged<Item>> {
        self.get_sub_category(sub_category_id).await?;
        self.list_items(ItemFilter::in_sub_category(sub_category_id), page)
            .await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(&self, input: NewCategory) -> CascadeResult<Category> {
        validate_new_category(&input)?;

        let now = Utc::now();
        let mut category = Category {
            id: generate_id(),
            name: input.name.trim().to_string(),
            image: input.image,
            description: input.description,
            tax_applicable: false,
            tax_rate: TaxRate::zero(),
            tax_type: None,
            created_at: now,
            updated_at: now,
        };
        category.set_tax(input.tax);

        self.store.insert_category(&category).await?;

        info!(id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Updates a category and cascades when its tax changed.
    pub async fn update_category(
        &self,
        id: &str,
        changes: CategoryChanges,
    ) -> CascadeResult<Updated<Category>> {
        let mut category = self.get_category(id).await?;
        let before = category.tax_settings();

        if let Some(name) = changes.name {
            validate_name("name", &name)?;
            category.name = name.trim().to_string();
        }
        if let Some(image) = changes.image {
            validate_required("image", &image)?;
            category.image = image;
        }
        if let Some(description) = changes.description {
            validate_required("description", &description)?;
            category.description = description;
        }
        if let Some(tax) = changes.tax {
            validate_category_tax(&tax)?;
            category.set_tax(tax);
        }

        category.updated_at = Utc::now();
        self.store.update_category(&category).await?;

        if category.tax_settings() == before {
            return Ok(Updated::plain(category));
        }

        let report = self.propagator.on_category_tax_changed(id).await?;
        Ok(self.with_report(category, report))
    }

    /// Deletes an empty category together with its subcategories.
    pub async fn delete_category(&self, id: &str) -> CascadeResult<CategoryDeletion> {
        self.guard.delete_category(id).await
    }

    /// Re-runs propagation over every item of a category.
    ///
    /// Used to repair totals after an incomplete cascade.
    pub async fn resync_category(&self, id: &str) -> CascadeResult<CascadeReport> {
        self.get_category(id).await?;
        let items = self.store.find_items_by_category(id).await?;

        let report = self
            .propagator
            .recompute_items(
                CascadeTrigger::Resync {
                    category_id: id.to_string(),
                },
                items,
            )
            .await;
        Ok(report)
    }

    // =========================================================================
    // SubCategories
    // =========================================================================

    pub async fn create_sub_category(&self, input: NewSubCategory) -> CascadeResult<SubCategory> {
        validate_new_sub_category(&input)?;

        if self.store.get_category(&input.category_id).await?.is_none() {
            return Err(CascadeError::invalid_ancestor(
                EntityKind::Category,
                input.category_id,
            ));
        }

        let now = Utc::now();
        let sub_category = SubCategory {
            id: generate_id(),
            name: input.name.trim().to_string(),
            image: input.image,
            description: input.description,
            category_id: input.category_id,
            tax: input.tax.normalized(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_sub_category(&sub_category).await?;

        info!(
            id = %sub_category.id,
            category_id = %sub_category.category_id,
            inherits = !sub_category.has_tax_override(),
            "SubCategory created"
        );
        Ok(sub_category)
    }

    /// Updates a subcategory and cascades to its items when its tax changed.
    pub async fn update_sub_category(
        &self,
        id: &str,
        changes: SubCategoryChanges,
    ) -> CascadeResult<Updated<SubCategory>> {
        let mut sub_category = self.get_sub_category(id).await?;
        let before = sub_category.tax;

        if let Some(name) = changes.name {
            validate_name("name", &name)?;
            sub_category.name = name.trim().to_string();
        }
        if let Some(image) = changes.image {
            validate_required("image", &image)?;
            sub_category.image = image;
        }
        if let Some(description) = changes.description {
            validate_required("description", &description)?;
            sub_category.description = description;
        }
        if let Some(tax) = changes.tax {
            validate_tax_settings(&tax)?;
            sub_category.tax = tax.normalized();
        }

        sub_category.updated_at = Utc::now();
        self.store.update_sub_category(&sub_category).await?;

        if sub_category.tax == before {
            return Ok(Updated::plain(sub_category));
        }

        let report = self.propagator.on_sub_category_tax_changed(id).await?;
        Ok(self.with_report(sub_category, report))
    }

    /// Deletes a subcategory under the configured policy. Items moved up to
    /// the category are recomputed once the delete has committed.
    pub async fn delete_sub_category(&self, id: &str) -> CascadeResult<Updated<SubCategoryDeletion>> {
        let deletion = self.guard.delete_sub_category(id).await?;

        if deletion.reassigned.is_empty() {
            return Ok(Updated::plain(deletion));
        }

        let report = self
            .propagator
            .recompute_items(
                CascadeTrigger::SubCategoryDeleted {
                    sub_category_id: id.to_string(),
                },
                deletion.reassigned.clone(),
            )
            .await;
        Ok(self.with_report(deletion, report))
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Creates an item with its total computed from the resolved tax.
    ///
    /// ## Errors
    /// * `Validation` / `InvalidAmount` - bad input
    /// * `InvalidAncestor` - a referenced parent is missing, or the category
    ///   and subcategory references disagree
    pub async fn create_item(&self, input: NewItem) -> CascadeResult<Item> {
        validate_new_item(&input)?;

        let category_id = match (&input.sub_category_id, &input.category_id) {
            (Some(sub_category_id), category_id) => {
                let sub_category = self
                    .store
                    .get_sub_category(sub_category_id)
                    .await?
                    .ok_or_else(|| {
                        CascadeError::invalid_ancestor(EntityKind::SubCategory, sub_category_id)
                    })?;

                if let Some(category_id) = category_id {
                    if *category_id != sub_category.category_id {
                        return Err(CascadeError::invalid_ancestor(
                            EntityKind::Category,
                            category_id,
                        ));
                    }
                }
                sub_category.category_id
            }
            (None, Some(category_id)) => category_id.clone(),
            (None, None) => {
                return Err(CascadeError::Internal(
                    "item without parent passed validation".into(),
                ))
            }
        };

        let now = Utc::now();
        let mut item = Item {
            id: generate_id(),
            name: input.name.trim().to_string(),
            image: input.image,
            description: input.description,
            category_id,
            sub_category_id: input.sub_category_id,
            base_amount_cents: input.base_amount_cents,
            discount_cents: input.discount_cents,
            tax: input.tax.normalized(),
            total_amount_cents: 0,
            created_at: now,
            updated_at: now,
        };

        let resolution = self.resolver.resolve_item(&item).await?;
        let totals = compute_total(item.base_amount(), item.discount(), &resolution.descriptor)?;
        item.total_amount_cents = totals.total_amount.cents();

        self.store.insert_item(&item).await?;

        info!(
            id = %item.id,
            category_id = %item.category_id,
            tax_source = %resolution.source,
            total = %totals.total_amount,
            "Item created"
        );
        Ok(self.settle(item).await)
    }

    /// Applies a partial update. Amount or tax changes recompute the total.
    pub async fn update_item(&self, id: &str, changes: ItemChanges) -> CascadeResult<Item> {
        let mut item = self.get_item(id).await?;
        let touches_total = changes.touches_total();
        let mut patch = ItemPatch::default();

        if let Some(name) = changes.name {
            validate_name("name", &name)?;
            patch.name = Some(name.trim().to_string());
        }
        if let Some(image) = changes.image {
            validate_required("image", &image)?;
            patch.image = Some(image);
        }
        if let Some(description) = changes.description {
            validate_required("description", &description)?;
            patch.description = Some(description);
        }
        if let Some(tax) = changes.tax {
            validate_tax_settings(&tax)?;
            item.tax = tax.normalized();
            patch.tax = Some(item.tax);
        }
        if let Some(base) = changes.base_amount_cents {
            item.base_amount_cents = base;
            patch.base_amount_cents = Some(base);
        }
        if let Some(discount) = changes.discount_cents {
            item.discount_cents = discount;
            patch.discount_cents = Some(discount);
        }

        if patch.is_empty() {
            return Ok(item);
        }

        if touches_total {
            self.cache.invalidate(id).await;
            let resolution = self.resolver.resolve_item(&item).await?;
            let totals = compute_total(item.base_amount(), item.discount(), &resolution.descriptor)?;
            patch.total_amount_cents = Some(totals.total_amount.cents());
        }

        let updated = self.store.update_item(id, &patch).await?;
        info!(id, fields = patch.field_count(), "Item updated");

        if !touches_total {
            return Ok(updated);
        }
        Ok(self.settle(updated).await)
    }

    pub async fn delete_item(&self, id: &str) -> CascadeResult<()> {
        self.store.delete_item(id).await?;
        self.cache.invalidate(id).await;

        info!(id, "Item deleted");
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Re-checks a just-written item against the committed parents.
    ///
    /// A parent tax change that committed after the item's tax was resolved
    /// may have cascaded past the item before the write landed. The write is
    /// already committed, so a failure here is logged and the item is
    /// returned as written; the next cascade or resync repairs it.
    async fn settle(&self, written: Item) -> Item {
        match self.propagator.settle_item(&written.id).await {
            Ok(settled) => settled,
            Err(err) => {
                warn!(id = %written.id, error = %err, "Item total not re-checked after write");
                written
            }
        }
    }

    fn with_report<T>(&self, entity: T, report: CascadeReport) -> Updated<T> {
        if !report.is_complete() {
            warn!(
                trigger = %report.trigger,
                failed = report.failures.len(),
                abandoned = report.abandoned.len(),
                "Change committed with an incomplete cascade"
            );
        }

        Updated {
            entity,
            cascade: Some(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubCategoryDeletePolicy;
    use crate::testing::{category_tax_edit, memory_store, FaultyStore};
    use taxon_core::{CategoryTax, TaxSettings, TaxSource, TaxType, ValidationError};

    fn percent(bps: u32) -> CategoryTax {
        CategoryTax::applicable(TaxRate::from_bps(bps), TaxType::Percentage)
    }

    fn new_category(name: &str, tax: CategoryTax) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            image: format!("https://img.test/{}.png", name),
            description: format!("{} department", name),
            tax,
        }
    }

    fn new_sub_category(category_id: &str, name: &str, tax: TaxSettings) -> NewSubCategory {
        NewSubCategory {
            category_id: category_id.to_string(),
            name: name.to_string(),
            image: format!("https://img.test/{}.png", name),
            description: name.to_string(),
            tax,
        }
    }

    fn new_item(sub_category_id: &str, base: i64, discount: i64, tax: TaxSettings) -> NewItem {
        NewItem {
            name: "Cola".to_string(),
            image: "https://img.test/cola.png".to_string(),
            description: "330ml can".to_string(),
            category_id: None,
            sub_category_id: Some(sub_category_id.to_string()),
            base_amount_cents: base,
            discount_cents: discount,
            tax,
        }
    }

    async fn catalog() -> Catalog {
        Catalog::new(memory_store().await, CascadeConfig::default())
    }

    /// C at 10%, S inheriting.
    async fn beverages(catalog: &Catalog) -> (Category, SubCategory) {
        let category = catalog
            .create_category(new_category("Beverages", percent(1000)))
            .await
            .unwrap();
        let sub_category = catalog
            .create_sub_category(new_sub_category(&category.id, "Soft Drinks", TaxSettings::inherit()))
            .await
            .unwrap();
        (category, sub_category)
    }

    #[tokio::test]
    async fn test_item_inherits_category_tax() {
        let catalog = catalog().await;
        let (category, sub_category) = beverages(&catalog).await;

        let item = catalog
            .create_item(new_item(&sub_category.id, 10_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        assert_eq!(item.category_id, category.id);
        assert_eq!(item.total_amount_cents, 11_000);
        assert_eq!(
            catalog.effective_tax(&item.id).await.unwrap(),
            TaxDescriptor::applicable(TaxRate::from_bps(1000), TaxType::Percentage)
        );

        let sub_tax = catalog.sub_category_tax(&sub_category.id).await.unwrap();
        assert_eq!(sub_tax.source, TaxSource::Category);
    }

    #[tokio::test]
    async fn test_category_rate_change_cascades() {
        let catalog = catalog().await;
        let (category, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 10_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();
        let fixed_five = TaxSettings::explicit(true, TaxRate::from_bps(500), Some(TaxType::Fixed));
        let j = catalog
            .create_item(new_item(&sub_category.id, 5_000, 0, fixed_five))
            .await
            .unwrap();
        assert_eq!(j.total_amount_cents, 5_500);

        let updated = catalog
            .update_category(
                &category.id,
                CategoryChanges {
                    tax: Some(percent(2000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = updated.cascade.as_ref().unwrap();
        assert_eq!(report.recomputed, vec![item.id.clone()]);
        assert_eq!(report.skipped_overrides, vec![j.id.clone()]);
        assert!(updated.warning().is_none());

        assert_eq!(catalog.get_item(&item.id).await.unwrap().total_amount_cents, 12_000);
        assert_eq!(catalog.get_item(&j.id).await.unwrap().total_amount_cents, 5_500);
        assert_eq!(
            catalog.effective_tax(&item.id).await.unwrap().rate,
            TaxRate::from_bps(2000)
        );
    }

    #[tokio::test]
    async fn test_rename_does_not_cascade() {
        let catalog = catalog().await;
        let (category, _) = beverages(&catalog).await;

        let updated = catalog
            .update_category(
                &category.id,
                CategoryChanges {
                    name: Some("Drinks".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.entity.name, "Drinks");
        assert!(updated.cascade.is_none());
    }

    #[tokio::test]
    async fn test_discount_above_base_is_rejected() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;

        let err = catalog
            .create_item(new_item(&sub_category.id, 100, 150, TaxSettings::inherit()))
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::InvalidAmount { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_update_item_recomputes_total() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 10_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        let updated = catalog
            .update_item(
                &item.id,
                ItemChanges {
                    discount_cents: Some(1_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_amount_cents, 10_000);

        let err = catalog
            .update_item(
                &item.id,
                ItemChanges {
                    discount_cents: Some(20_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::InvalidAmount { .. }));

        let exempt = catalog
            .update_item(
                &item.id,
                ItemChanges {
                    tax: Some(TaxSettings::exempt()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(exempt.total_amount_cents, 9_000);
        assert!(!catalog.effective_tax(&item.id).await.unwrap().applicable);
    }

    #[tokio::test]
    async fn test_partial_override_is_rejected() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;

        let rate_without_type = TaxSettings {
            applicable: Some(true),
            rate: Some(TaxRate::from_bps(500)),
            tax_type: None,
        };
        let err = catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, rate_without_type))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CascadeError::Validation(ValidationError::Required { .. })
        ));
    }

    #[tokio::test]
    async fn test_mismatched_parents_are_rejected() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;
        let snacks = catalog
            .create_category(new_category("Snacks", CategoryTax::exempt()))
            .await
            .unwrap();

        let mut input = new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit());
        input.category_id = Some(snacks.id.clone());

        let err = catalog.create_item(input).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::InvalidAncestor {
                entity: EntityKind::Category,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_sub_category_under_missing_category() {
        let catalog = catalog().await;
        let err = catalog
            .create_sub_category(new_sub_category(
                "550e8400-e29b-41d4-a716-446655440000",
                "Orphan",
                TaxSettings::inherit(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::InvalidAncestor { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_category_name_conflicts() {
        let catalog = catalog().await;
        beverages(&catalog).await;

        let err = catalog
            .create_category(new_category("Beverages", CategoryTax::exempt()))
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_sub_category_override_change_cascades() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        let updated = catalog
            .update_sub_category(
                &sub_category.id,
                SubCategoryChanges {
                    tax: Some(TaxSettings::exempt()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.entity.has_tax_override());
        assert_eq!(updated.cascade.unwrap().recomputed, vec![item.id.clone()]);
        assert_eq!(catalog.get_item(&item.id).await.unwrap().total_amount_cents, 1_000);
    }

    #[tokio::test]
    async fn test_delete_category_with_items_is_refused() {
        let catalog = catalog().await;
        let (category, sub_category) = beverages(&catalog).await;
        catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        let err = catalog.delete_category(&category.id).await.unwrap_err();
        assert!(matches!(err, CascadeError::HasChildren { .. }));
        assert!(catalog.get_sub_category(&sub_category.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_sub_category_recomputes_reassigned_items() {
        let catalog = catalog().await;
        let category = catalog
            .create_category(new_category("Beverages", percent(1000)))
            .await
            .unwrap();
        let water = catalog
            .create_sub_category(new_sub_category(&category.id, "Water", TaxSettings::exempt()))
            .await
            .unwrap();
        let bottle = catalog
            .create_item(new_item(&water.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();
        assert_eq!(bottle.total_amount_cents, 1_000);

        let removal = catalog.delete_sub_category(&water.id).await.unwrap();
        assert_eq!(removal.entity.reassigned.len(), 1);
        assert_eq!(removal.cascade.unwrap().recomputed, vec![bottle.id.clone()]);

        let moved = catalog.get_item(&bottle.id).await.unwrap();
        assert_eq!(moved.sub_category_id, None);
        assert_eq!(moved.total_amount_cents, 1_100);
    }

    #[tokio::test]
    async fn test_reject_policy_through_catalog() {
        let config = CascadeConfig::default().with_sub_category_policy(SubCategoryDeletePolicy::Reject);
        let catalog = Catalog::new(memory_store().await, config);
        let (_, sub_category) = beverages(&catalog).await;
        catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        let err = catalog.delete_sub_category(&sub_category.id).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::HasChildren {
                entity: EntityKind::SubCategory,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_item_evicts_cache() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();
        assert!(catalog.cache().get(&item.id).await.is_some());

        catalog.delete_item(&item.id).await.unwrap();
        assert!(catalog.cache().get(&item.id).await.is_none());

        let err = catalog.delete_item(&item.id).await.unwrap_err();
        assert!(matches!(err, CascadeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_incomplete_cascade_keeps_parent_change_and_resync_repairs() {
        let faulty = Arc::new(FaultyStore::new(memory_store().await));
        let store: Arc<dyn HierarchyStore> = faulty.clone();
        let catalog = Catalog::new(store, CascadeConfig::default());
        let (category, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 10_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        faulty.fail_update(&item.id);
        let updated = catalog
            .update_category(
                &category.id,
                CategoryChanges {
                    tax: Some(percent(2000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let warning = updated.warning().unwrap();
        assert!(warning.is_warning());
        assert_eq!(warning.status_code(), 200);
        assert_eq!(
            catalog.get_category(&category.id).await.unwrap().tax_rate,
            TaxRate::from_bps(2000)
        );
        assert_eq!(catalog.get_item(&item.id).await.unwrap().total_amount_cents, 11_000);

        // Store recovers; a resync restores consistency.
        let healthy = Catalog::new(faulty.inner_store(), CascadeConfig::default());
        let report = healthy.resync_category(&category.id).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(healthy.get_item(&item.id).await.unwrap().total_amount_cents, 12_000);
    }

    #[tokio::test]
    async fn test_dangling_sub_category_is_invalid_ancestor() {
        let faulty = Arc::new(FaultyStore::new(memory_store().await));
        let store: Arc<dyn HierarchyStore> = faulty.clone();
        let catalog = Catalog::new(store, CascadeConfig::default().with_cache_ttl(std::time::Duration::ZERO));
        let (_, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        faulty.hide_sub_category(&sub_category.id);
        let err = catalog.effective_tax(&item.id).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::InvalidAncestor {
                entity: EntityKind::SubCategory,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_parent_change_during_item_update_is_picked_up() {
        let faulty = Arc::new(FaultyStore::new(memory_store().await));
        let store: Arc<dyn HierarchyStore> = faulty.clone();
        let catalog = Catalog::new(store, CascadeConfig::default());
        let (category, sub_category) = beverages(&catalog).await;
        let item = catalog
            .create_item(new_item(&sub_category.id, 10_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();

        // The category moves to 20% after the update resolved 10%, and its
        // cascade has already passed this item.
        faulty.interleave_before_write(&item.id, category_tax_edit(&category, percent(2000)));

        let updated = catalog
            .update_item(
                &item.id,
                ItemChanges {
                    discount_cents: Some(1_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.total_amount_cents, 11_000);
        assert_eq!(catalog.get_item(&item.id).await.unwrap().total_amount_cents, 11_000);
        assert_eq!(
            catalog.effective_tax(&item.id).await.unwrap().rate,
            TaxRate::from_bps(2000)
        );
    }

    #[tokio::test]
    async fn test_huge_base_amount_is_invalid_not_a_panic() {
        let catalog = catalog().await;
        let (_, sub_category) = beverages(&catalog).await;

        let err = catalog
            .create_item(new_item(&sub_category.id, i64::MAX - 10, 0, TaxSettings::inherit()))
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::InvalidAmount { .. }));

        let item = catalog
            .create_item(new_item(&sub_category.id, 1_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();
        let err = catalog
            .update_item(
                &item.id,
                ItemChanges {
                    base_amount_cents: Some(i64::MAX),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::InvalidAmount { .. }));
        assert_eq!(catalog.get_item(&item.id).await.unwrap().base_amount_cents, 1_000);
    }

    #[tokio::test]
    async fn test_list_items_with_filters() {
        let catalog = catalog().await;
        let (category, soft_drinks) = beverages(&catalog).await;
        let water = catalog
            .create_sub_category(new_sub_category(&category.id, "Water", TaxSettings::exempt()))
            .await
            .unwrap();

        let cola = catalog
            .create_item(new_item(&soft_drinks.id, 10_000, 0, TaxSettings::inherit()))
            .await
            .unwrap();
        let mut sparkling = new_item(&water.id, 300, 0, TaxSettings::inherit());
        sparkling.name = "Sparkling Water".to_string();
        let sparkling = catalog.create_item(sparkling).await.unwrap();

        let taxed = catalog
            .list_items(
                ItemFilter {
                    tax_applicable: Some(true),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(taxed.total, 1);
        assert_eq!(taxed.data[0].id, cola.id);

        let search = catalog
            .list_items(
                ItemFilter {
                    search: Some("water".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(search.data[0].id, sparkling.id);

        let cheap = catalog
            .list_items(
                ItemFilter {
                    max_total_cents: Some(1_000),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(cheap.total, 1);

        // No match is an empty page, not an error.
        let none = catalog
            .list_items(
                ItemFilter {
                    search: Some("juice".to_string()),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(none.total_pages, 0);

        let err = catalog
            .list_items(
                ItemFilter {
                    min_total_cents: Some(500),
                    max_total_cents: Some(100),
                    ..Default::default()
                },
                Page::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_per_parent_listings() {
        let catalog = catalog().await;
        let (category, soft_drinks) = beverages(&catalog).await;
        catalog
            .create_sub_category(new_sub_category(&category.id, "Water", TaxSettings::exempt()))
            .await
            .unwrap();
        for base in [100, 200, 300] {
            catalog
                .create_item(new_item(&soft_drinks.id, base, 0, TaxSettings::inherit()))
                .await
                .unwrap();
        }
        let mut direct = new_item(&soft_drinks.id, 400, 0, TaxSettings::inherit());
        direct.sub_category_id = None;
        direct.category_id = Some(category.id.clone());
        catalog.create_item(direct).await.unwrap();

        let subs = catalog.list_sub_categories(&category.id).await.unwrap();
        assert_eq!(subs.len(), 2);

        let all = catalog.category_items(&category.id, Page::new(1, 3)).await.unwrap();
        assert_eq!(all.total, 4);
        assert_eq!(all.data.len(), 3);
        assert_eq!(all.total_pages, 2);

        let nested = catalog
            .sub_category_items(&soft_drinks.id, Page::default())
            .await
            .unwrap();
        assert_eq!(nested.total, 3);

        let categories = catalog.list_categories(Page { page: 0, limit: 0 }).await.unwrap();
        assert_eq!(categories.page, 1);
        assert_eq!(categories.limit, 1);
        assert_eq!(categories.total, 1);

        assert!(matches!(
            catalog.list_sub_categories("missing").await.unwrap_err(),
            CascadeError::NotFound { .. }
        ));
        assert!(matches!(
            catalog.category_items("missing", Page::default()).await.unwrap_err(),
            CascadeError::NotFound { .. }
        ));
        assert!(matches!(
            catalog
                .sub_category_items("missing", Page::default())
                .await
                .unwrap_err(),
            CascadeError::NotFound { .. }
        ));
    }
}
