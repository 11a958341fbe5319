//! # Ancestry Resolver
//!
//! Loads an entity's ancestors from the store and runs the core resolution
//! rules over them. Resolution is always dynamic: nothing is copied from a
//! parent at creation time, so a parent change is visible to every
//! descendant on its next resolve.
//!
//! ```text
//! Item ──sub_category_id──► SubCategory ──category_id──► Category
//!   │                           │                           │
//!   └── ChainLevel(Own) ────────┴── ChainLevel(SubCategory) ┴── ChainLevel(Category)
//! ```

use std::sync::Arc;
use tracing::{debug, trace};

use crate::cache::TaxCache;
use crate::error::{CascadeError, CascadeResult};
use taxon_core::tax::{resolve_chain, ChainLevel};
use taxon_core::{EntityKind, Item, Resolution, SubCategory, TaxDescriptor, TaxSource};
use taxon_db::HierarchyStore;

/// Resolves effective tax against the live hierarchy.
#[derive(Clone)]
pub struct TaxResolver {
    store: Arc<dyn HierarchyStore>,
    cache: TaxCache,
}

impl TaxResolver {
    pub fn new(store: Arc<dyn HierarchyStore>, cache: TaxCache) -> Self {
        Self { store, cache }
    }

    /// Builds the chain `[own, subcategory?, category]` for an item.
    ///
    /// ## Errors
    /// * `InvalidAncestor` - the subcategory or category is missing, or the
    ///   subcategory belongs to a different category than the item records
    pub async fn item_chain(&self, item: &Item) -> CascadeResult<Vec<ChainLevel>> {
        let mut chain = Vec::with_capacity(3);
        chain.push(ChainLevel::new(TaxSource::Own, item.tax));

        if let Some(sub_category_id) = &item.sub_category_id {
            let sub_category = self
                .store
                .get_sub_category(sub_category_id)
                .await?
                .ok_or_else(|| {
                    CascadeError::invalid_ancestor(EntityKind::SubCategory, sub_category_id)
                })?;

            if sub_category.category_id != item.category_id {
                return Err(CascadeError::invalid_ancestor(
                    EntityKind::Category,
                    &item.category_id,
                ));
            }

            chain.push(ChainLevel::new(TaxSource::SubCategory, sub_category.tax));
        }

        let category = self
            .store
            .get_category(&item.category_id)
            .await?
            .ok_or_else(|| CascadeError::invalid_ancestor(EntityKind::Category, &item.category_id))?;
        chain.push(ChainLevel::new(TaxSource::Category, category.tax_settings()));

        Ok(chain)
    }

    /// Resolves an item without touching the cache.
    pub async fn resolve_item(&self, item: &Item) -> CascadeResult<Resolution> {
        let chain = self.item_chain(item).await?;
        let resolution = resolve_chain(&chain);

        trace!(
            item_id = %item.id,
            source = %resolution.source,
            applicable = resolution.descriptor.applicable,
            "Resolved item tax"
        );
        Ok(resolution)
    }

    /// Resolves a subcategory against its category.
    pub async fn resolve_sub_category(&self, sub_category: &SubCategory) -> CascadeResult<Resolution> {
        let category = self
            .store
            .get_category(&sub_category.category_id)
            .await?
            .ok_or_else(|| {
                CascadeError::invalid_ancestor(EntityKind::Category, &sub_category.category_id)
            })?;

        let chain = [
            ChainLevel::new(TaxSource::Own, sub_category.tax),
            ChainLevel::new(TaxSource::Category, category.tax_settings()),
        ];
        Ok(resolve_chain(&chain))
    }

    /// Effective tax of an item, served from the cache when fresh.
    ///
    /// ## Errors
    /// * `NotFound` - no such item
    /// * `InvalidAncestor` - see [`TaxResolver::item_chain`]
    pub async fn effective_tax(&self, item_id: &str) -> CascadeResult<TaxDescriptor> {
        if let Some(descriptor) = self.cache.get(item_id).await {
            debug!(item_id, "Tax cache hit");
            return Ok(descriptor);
        }

        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| CascadeError::not_found(EntityKind::Item, item_id))?;

        let resolution = self.resolve_item(&item).await?;
        self.cache.insert(item_id, resolution.descriptor).await;

        Ok(resolution.descriptor)
    }
}
