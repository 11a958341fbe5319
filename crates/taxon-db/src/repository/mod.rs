//! # Repository Module
//!
//! SQLite repositories for the three catalog tables.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  SqliteStore (HierarchyStore)          SqliteTransaction               │
//! │       │                                     │                           │
//! │       │ pool                                │ &mut *tx                  │
//! │       ▼                                     ▼                           │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ category / sub_category / item                                   │  │
//! │  │ ├── Repository structs (own a pool clone)                        │  │
//! │  │ └── executor-generic query fns (shared with transactions)        │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`](category::CategoryRepository)
//! - [`SubCategoryRepository`](sub_category::SubCategoryRepository)
//! - [`ItemRepository`](item::ItemRepository)

pub mod category;
pub mod item;
pub mod sub_category;

use taxon_core::{TaxRate, TaxSettings, TaxType};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

// =============================================================================
// Column Conversions
// =============================================================================
// Rates are stored as INTEGER hundredths. SQLite has no unsigned type, so
// the column is read as i64 and range-checked.

pub(crate) fn rate_from_column(value: i64) -> DbResult<TaxRate> {
    u32::try_from(value)
        .map(TaxRate::from_hundredths)
        .map_err(|_| DbError::Internal(format!("tax_rate out of range: {}", value)))
}

pub(crate) fn rate_to_column(rate: TaxRate) -> i64 {
    i64::from(rate.hundredths())
}

pub(crate) fn settings_from_columns(
    applicable: Option<bool>,
    rate: Option<i64>,
    tax_type: Option<TaxType>,
) -> DbResult<TaxSettings> {
    Ok(TaxSettings {
        applicable,
        rate: rate.map(rate_from_column).transpose()?,
        tax_type,
    })
}

/// SQLite binds signed integers only.
pub(crate) fn offset_to_column(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Generates a new entity ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_column_range() {
        assert_eq!(rate_from_column(1000).unwrap(), TaxRate::from_bps(1000));
        assert!(rate_from_column(-1).is_err());
        assert_eq!(rate_to_column(TaxRate::from_bps(825)), 825);
    }

    #[test]
    fn test_settings_from_nullable_columns() {
        let settings = settings_from_columns(None, None, None).unwrap();
        assert_eq!(settings, TaxSettings::inherit());

        let settings = settings_from_columns(Some(true), Some(500), Some(TaxType::Fixed)).unwrap();
        assert!(settings.has_override());
        assert_eq!(settings.rate, Some(TaxRate::from_hundredths(500)));
    }
}
