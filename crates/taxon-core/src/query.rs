//! # Query Types
//!
//! Paging and filtering inputs for catalog listings.
//!
//! ## Item Filter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  category_id      items of the category (with or without subcategory)  │
//! │  sub_category_id  items under one subcategory                           │
//! │  tax_applicable   EFFECTIVE applicability (own → subcategory → category)│
//! │  min/max_total    inclusive bounds on total_amount_cents               │
//! │  search           case-insensitive substring of the name               │
//! │                                                                         │
//! │  Unset fields do not filter. Set fields are AND-ed.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page a single listing returns.
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// Paging
// =============================================================================

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Builds a page request, clamping `page` to at least 1 and `limit` to
    /// `1..=MAX_PAGE_LIMIT`.
    ///
    /// ```rust
    /// use taxon_core::query::{Page, MAX_PAGE_LIMIT};
    ///
    /// assert_eq!(Page::new(0, 0), Page::new(1, 1));
    /// assert_eq!(Page::new(3, 10_000).limit, MAX_PAGE_LIMIT);
    /// assert_eq!(Page::new(3, 20).offset(), 40);
    /// ```
    pub fn new(page: u32, limit: u32) -> Self {
        Page {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Re-applies the clamping of [`Page::new`] to a deserialized request.
    pub fn normalized(self) -> Self {
        Page::new(self.page, self.limit)
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(1, DEFAULT_PAGE_LIMIT)
    }
}

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Paged<T> {
    pub fn new(data: Vec<T>, total: u64, page: Page) -> Self {
        Paged {
            data,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: total.div_ceil(u64::from(page.limit)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

// =============================================================================
// Item Filter
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemFilter {
    pub category_id: Option<String>,
    pub sub_category_id: Option<String>,
    pub tax_applicable: Option<bool>,
    pub min_total_cents: Option<i64>,
    pub max_total_cents: Option<i64>,
    pub search: Option<String>,
}

impl ItemFilter {
    pub fn in_category(category_id: impl Into<String>) -> Self {
        ItemFilter {
            category_id: Some(category_id.into()),
            ..ItemFilter::default()
        }
    }

    pub fn in_sub_category(sub_category_id: impl Into<String>) -> Self {
        ItemFilter {
            sub_category_id: Some(sub_category_id.into()),
            ..ItemFilter::default()
        }
    }

    /// Search term with surrounding whitespace removed; `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Price bounds must be non-negative and ordered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("min_total_cents", self.min_total_cents),
            ("max_total_cents", self.max_total_cents),
        ] {
            if let Some(value) = value {
                if value < 0 {
                    return Err(ValidationError::OutOfRange {
                        field: field.to_string(),
                        min: 0,
                        max: i64::MAX,
                    });
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min_total_cents, self.max_total_cents) {
            if min > max {
                return Err(ValidationError::OutOfRange {
                    field: "min_total_cents".to_string(),
                    min: 0,
                    max,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_round_up() {
        let paged = Paged::new(vec![1, 2, 3], 23, Page::new(1, 10));
        assert_eq!(paged.total_pages, 3);

        let empty: Paged<i32> = Paged::new(vec![], 0, Page::default());
        assert_eq!(empty.total_pages, 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::default().offset(), 0);
        assert_eq!(Page::new(2, 10).offset(), 10);
        assert_eq!(Page { page: 0, limit: 0 }.normalized(), Page::new(1, 1));
    }

    #[test]
    fn test_filter_bounds() {
        assert!(ItemFilter::default().validate().is_ok());

        let inverted = ItemFilter {
            min_total_cents: Some(500),
            max_total_cents: Some(100),
            ..ItemFilter::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));

        let negative = ItemFilter {
            max_total_cents: Some(-1),
            ..ItemFilter::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ItemFilter {
            search: Some("   ".to_string()),
            ..ItemFilter::default()
        };
        assert_eq!(filter.search_term(), None);

        let filter = ItemFilter {
            search: Some(" cola ".to_string()),
            ..ItemFilter::default()
        };
        assert_eq!(filter.search_term(), Some("cola"));
    }
}
