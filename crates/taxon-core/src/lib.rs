//! # taxon-core: Pure Business Logic for Taxon
//!
//! This crate holds the tax inheritance rules and the total formula as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Taxon Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             Request layer (HTTP handlers, views)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Catalog calls                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     taxon-cascade (cache, propagator, deletion guard)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ taxon-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │    tax    │  │   total   │  │   │
//! │  │   │ Category  │  │   Money   │  │ resolver  │  │ calculator│  │   │
//! │  │   │ SubCat    │  │  TaxRate  │  │  chain    │  │ breakdown │  │   │
//! │  │   │ Item      │  │           │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    taxon-db (Store Adapter)                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Category, SubCategory, Item, TaxSettings)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`tax`] - Tax Resolver: effective tax from an inheritance chain
//! - [`total`] - Total Calculator: tax amount and item total
//! - [`query`] - Paging and item filters for listings
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use taxon_core::money::Money;
//! use taxon_core::tax::resolve;
//! use taxon_core::total::compute_total;
//! use taxon_core::types::{TaxRate, TaxSettings, TaxType};
//!
//! // Category: 10% percentage tax. SubCategory and Item inherit.
//! let category = TaxSettings::explicit(true, TaxRate::from_percentage(10.0), Some(TaxType::Percentage));
//! let descriptor = resolve(&TaxSettings::inherit(), &[TaxSettings::inherit(), category]);
//!
//! let totals = compute_total(Money::from_cents(10_000), Money::zero(), &descriptor).unwrap();
//! assert_eq!(totals.tax_amount.cents(), 1_000);
//! assert_eq!(totals.total_amount.cents(), 11_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod query;
pub mod tax;
pub mod total;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use query::{ItemFilter, Page, Paged};
pub use tax::{Resolution, TaxDescriptor, TaxSource};
pub use total::TotalBreakdown;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default lifetime of a cached tax resolution, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Default number of items recomputed per cascade batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Highest percentage rate accepted, in basis points (100%).
pub const MAX_PERCENTAGE_BPS: u32 = 10_000;

/// Maximum length of a Category, SubCategory or Item name.
pub const MAX_NAME_LEN: usize = 200;
