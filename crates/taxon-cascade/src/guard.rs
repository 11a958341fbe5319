//! # Deletion Guard
//!
//! Deletes categories and subcategories inside a single store transaction.
//! Every check and write goes through one [`StoreTransaction`]; returning
//! early drops the transaction, which rolls it back.
//!
//! ```text
//! delete_category(C)
//!   begin ─► count items under C (whole subtree)
//!              ├─ > 0 ─► HasChildren (dropped: rollback)
//!              └─ 0 ───► delete subcategories of C, delete C ─► commit
//!
//! delete_sub_category(S)
//!   begin ─► count items under S
//!              ├─ > 0, Reject ──────────► HasChildren (dropped: rollback)
//!              └─ ReassignToCategory ───► load items, clear sub_category_id,
//!                                         delete S ─► commit
//! ```
//!
//! Reassigned items now inherit from their category; recomputing their
//! totals is the caller's job once the transaction has committed.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SubCategoryDeletePolicy;
use crate::error::{CascadeError, CascadeResult};
use taxon_core::{EntityKind, Item};
use taxon_db::HierarchyStore;

/// Result of a category delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDeletion {
    pub category_id: String,
    pub sub_categories_removed: u64,
}

/// Result of a subcategory delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubCategoryDeletion {
    pub sub_category_id: String,
    pub policy: SubCategoryDeletePolicy,
    /// Items moved up to the category, as stored after the commit.
    pub reassigned: Vec<Item>,
}

#[derive(Clone)]
pub struct DeletionGuard {
    store: Arc<dyn HierarchyStore>,
    policy: SubCategoryDeletePolicy,
}

impl DeletionGuard {
    pub fn new(store: Arc<dyn HierarchyStore>, policy: SubCategoryDeletePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> SubCategoryDeletePolicy {
        self.policy
    }

    /// Deletes a category and its subcategories when no item remains
    /// anywhere below it.
    ///
    /// ## Errors
    /// * `HasChildren` - at least one item below the category; nothing changed
    /// * `NotFound` - no such category
    pub async fn delete_category(&self, category_id: &str) -> CascadeResult<CategoryDeletion> {
        let mut tx = self.store.begin().await?;

        let items = tx.count_items_by_category(category_id).await?;
        if items > 0 {
            warn!(category_id, items, "Refusing to delete category with items");
            return Err(CascadeError::HasChildren {
                entity: EntityKind::Category,
                id: category_id.to_string(),
                items,
            });
        }

        let sub_categories_removed = tx.delete_category(category_id).await?;
        tx.commit().await?;

        info!(category_id, sub_categories_removed, "Category deleted");
        Ok(CategoryDeletion {
            category_id: category_id.to_string(),
            sub_categories_removed,
        })
    }

    /// Deletes a subcategory according to the configured policy.
    ///
    /// ## Errors
    /// * `HasChildren` - policy is `Reject` and items remain; nothing changed
    /// * `NotFound` - no such subcategory
    pub async fn delete_sub_category(&self, sub_category_id: &str) -> CascadeResult<SubCategoryDeletion> {
        let mut tx = self.store.begin().await?;

        let items = tx.count_items_by_sub_category(sub_category_id).await?;

        let reassigned = match self.policy {
            SubCategoryDeletePolicy::Reject if items > 0 => {
                warn!(sub_category_id, items, "Refusing to delete subcategory with items");
                return Err(CascadeError::HasChildren {
                    entity: EntityKind::SubCategory,
                    id: sub_category_id.to_string(),
                    items,
                });
            }
            SubCategoryDeletePolicy::Reject => Vec::new(),
            SubCategoryDeletePolicy::ReassignToCategory => {
                let mut moved = tx.find_items_by_sub_category(sub_category_id).await?;
                let cleared = tx.clear_sub_category_items(sub_category_id).await?;
                debug!(sub_category_id, cleared, "Items reassigned to category");

                for item in &mut moved {
                    item.sub_category_id = None;
                }
                moved
            }
        };

        tx.delete_sub_category(sub_category_id).await?;
        tx.commit().await?;

        info!(
            sub_category_id,
            policy = %self.policy,
            reassigned = reassigned.len(),
            "SubCategory deleted"
        );

        Ok(SubCategoryDeletion {
            sub_category_id: sub_category_id.to_string(),
            policy: self.policy,
            reassigned,
        })
    }
}
