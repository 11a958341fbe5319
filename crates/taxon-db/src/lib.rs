//! # taxon-db: Hierarchy Store Adapter
//!
//! This crate provides storage for the Category → SubCategory → Item
//! hierarchy. It uses SQLite with sqlx for async operations and exposes
//! everything the cascade engine needs through [`HierarchyStore`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Taxon Data Flow                                │
//! │                                                                         │
//! │  Catalog / CascadePropagator / DeletionGuard (taxon-cascade)           │
//! │       │                                                                 │
//! │       │ Arc<dyn HierarchyStore>                                         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     taxon-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CategoryRepo  │    │ 001_catalog  │  │   │
//! │  │   │ SqlitePool    │◄───│ SubCategoryRepo│   │ _schema.sql  │  │   │
//! │  │   │               │    │ ItemRepo      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │            ▲                                                    │   │
//! │  │            └── SqliteStore / SqliteTransaction (store.rs)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Table-level repositories
//! - [`store`] - `HierarchyStore` / `StoreTransaction` and their SQLite impls
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use taxon_db::{Database, DbConfig, HierarchyStore};
//!
//! let db = Database::new(DbConfig::new("path/to/taxon.db")).await?;
//! let store: Arc<dyn HierarchyStore> = Arc::new(db.store());
//!
//! let items = store.find_items_by_category(&category_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{
    HierarchyStore, ItemPatch, SqliteStore, SqliteTransaction, StoreTransaction, TotalBasis,
};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::generate_id;
pub use repository::item::ItemRepository;
pub use repository::sub_category::SubCategoryRepository;
