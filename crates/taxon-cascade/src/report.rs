//! # Cascade Reports
//!
//! What a propagator run did. A report is returned even when items failed
//! or the deadline passed; [`CascadeReport::warning`] turns an incomplete
//! run into the `IncompleteCascade` warning the request layer surfaces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::CascadeError;

/// Why a cascade ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CascadeTrigger {
    CategoryTaxChanged { category_id: String },
    SubCategoryTaxChanged { sub_category_id: String },
    /// Items moved up to their category after a subcategory delete.
    SubCategoryDeleted { sub_category_id: String },
    /// Manual repair after an earlier incomplete cascade.
    Resync { category_id: String },
}

impl fmt::Display for CascadeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeTrigger::CategoryTaxChanged { category_id } => {
                write!(f, "category {} tax changed", category_id)
            }
            CascadeTrigger::SubCategoryTaxChanged { sub_category_id } => {
                write!(f, "subcategory {} tax changed", sub_category_id)
            }
            CascadeTrigger::SubCategoryDeleted { sub_category_id } => {
                write!(f, "subcategory {} deleted", sub_category_id)
            }
            CascadeTrigger::Resync { category_id } => write!(f, "resync of category {}", category_id),
        }
    }
}

/// One item the propagator could not recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(item_id: impl Into<String>, err: &CascadeError) -> Self {
        ItemFailure {
            item_id: item_id.into(),
            reason: err.to_string(),
        }
    }

    pub fn into_error(self) -> CascadeError {
        CascadeError::PerItemRecomputeFailure {
            item_id: self.item_id,
            reason: self.reason,
        }
    }
}

/// Outcome of one cascade.
///
/// Every affected item ends up in exactly one of `recomputed`, `failures`,
/// `abandoned` or `skipped_overrides`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub trigger: CascadeTrigger,

    /// Subcategories without their own tax, reached by a category cascade.
    #[serde(default)]
    pub inherited_sub_categories: Vec<String>,

    pub recomputed: Vec<String>,

    /// Items with their own tax; never touched by a cascade.
    pub skipped_overrides: Vec<String>,

    pub failures: Vec<ItemFailure>,

    /// Items not attempted (or cut off) because the deadline passed.
    pub abandoned: Vec<String>,

    pub batches_completed: usize,

    pub elapsed: Duration,
}

impl CascadeReport {
    pub fn new(trigger: CascadeTrigger) -> Self {
        CascadeReport {
            trigger,
            inherited_sub_categories: Vec::new(),
            recomputed: Vec::new(),
            skipped_overrides: Vec::new(),
            failures: Vec::new(),
            abandoned: Vec::new(),
            batches_completed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// True when every non-override item was recomputed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.abandoned.is_empty()
    }

    /// Items the cascade had to consider, overrides included.
    pub fn affected(&self) -> usize {
        self.recomputed.len() + self.failures.len() + self.abandoned.len() + self.skipped_overrides.len()
    }

    /// `IncompleteCascade` when anything failed or was abandoned.
    pub fn warning(&self) -> Option<CascadeError> {
        if self.is_complete() {
            return None;
        }

        Some(CascadeError::IncompleteCascade {
            failed: self.failures.iter().map(|f| f.item_id.clone()).collect(),
            abandoned: self.abandoned.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> CascadeReport {
        CascadeReport::new(CascadeTrigger::CategoryTaxChanged {
            category_id: "cat-1".to_string(),
        })
    }

    #[test]
    fn test_complete_report_has_no_warning() {
        let mut report = report();
        report.recomputed = vec!["a".into(), "b".into()];
        report.skipped_overrides = vec!["c".into()];

        assert!(report.is_complete());
        assert_eq!(report.affected(), 3);
        assert!(report.warning().is_none());
    }

    #[test]
    fn test_incomplete_report_warns() {
        let mut report = report();
        report.recomputed = vec!["a".into()];
        report.failures = vec![ItemFailure {
            item_id: "b".into(),
            reason: "Database error: locked".into(),
        }];
        report.abandoned = vec!["c".into()];

        match report.warning() {
            Some(CascadeError::IncompleteCascade { failed, abandoned }) => {
                assert_eq!(failed, vec!["b".to_string()]);
                assert_eq!(abandoned, vec!["c".to_string()]);
            }
            other => panic!("expected IncompleteCascade, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_converts_to_error() {
        let failure = ItemFailure::new("item-9", &CascadeError::Database("disk full".into()));
        let err = failure.into_error();
        assert_eq!(
            err.to_string(),
            "Recompute failed for item item-9: Database error: disk full"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["trigger"]["kind"], "category_tax_changed");
        assert_eq!(json["trigger"]["category_id"], "cat-1");
        assert_eq!(json["batches_completed"], 0);
    }
}
