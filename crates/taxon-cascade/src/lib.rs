//! # taxon-cascade: Tax Cascade Engine
//!
//! Keeps every item total consistent with the tax settings inherited from
//! its subcategory and category.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Taxon Data Flow                                │
//! │                                                                         │
//! │  Request layer                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  taxon-cascade (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐                                             │   │
//! │  │   │    Catalog    │──────────────┬──────────────┐               │   │
//! │  │   └───────┬───────┘              │              │               │   │
//! │  │           ▼                      ▼              ▼               │   │
//! │  │   ┌───────────────┐   ┌──────────────────┐ ┌──────────────┐   │   │
//! │  │   │  TaxResolver  │◄──│ CascadePropagator│ │DeletionGuard │   │   │
//! │  │   └───────┬───────┘   └────────┬─────────┘ └──────┬───────┘   │   │
//! │  │           ▼                    ▼                  │           │   │
//! │  │   ┌──────────────────────────────────┐            │           │   │
//! │  │   │        TaxCache (RwLock)         │            │           │   │
//! │  │   └──────────────────────────────────┘            │           │   │
//! │  └───────────────────────────┬────────────────────────┼───────────┘   │
//! │                              ▼                        ▼               │
//! │                Arc<dyn HierarchyStore>      Box<dyn StoreTransaction> │
//! │                          (taxon-db)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`catalog`] - Command service used by the request layer
//! - [`propagator`] - Batched recomputation after a parent's tax changes
//! - [`guard`] - Transactional category/subcategory deletes
//! - [`resolver`] - Ancestry loading and cached effective tax
//! - [`cache`] - TTL cache of resolved descriptors
//! - [`report`] - Cascade reports
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taxon_cascade::{Catalog, CascadeConfig};
//! use taxon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("taxon.db")).await?;
//! let catalog = Catalog::new(Arc::new(db.store()), CascadeConfig::load_or_default(None));
//!
//! let updated = catalog.update_category(&id, changes).await?;
//! if let Some(warning) = updated.warning() {
//!     tracing::warn!(%warning, "cascade incomplete");
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod propagator;
pub mod report;
pub mod resolver;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::TaxCache;
pub use catalog::{Catalog, Updated};
pub use config::{CascadeConfig, SubCategoryDeletePolicy};
pub use error::{CascadeError, CascadeResult};
pub use guard::{CategoryDeletion, DeletionGuard, SubCategoryDeletion};
pub use propagator::CascadePropagator;
pub use report::{CascadeReport, CascadeTrigger, ItemFailure};
pub use resolver::TaxResolver;
