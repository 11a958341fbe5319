//! # Tax Resolver
//!
//! Computes the effective tax of an item or subcategory from its own fields
//! and its ancestor chain.
//!
//! ## Resolution Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  chain = [own, nearest ancestor, ..., furthest ancestor]               │
//! │           Item → SubCategory → Category                                 │
//! │                                                                         │
//! │  1. applicable: first level with `applicable` set decides.              │
//! │     No level sets it → not applicable.                                  │
//! │                                                                         │
//! │  2. applicable == true:                                                 │
//! │       rate = first `rate` set, from the deciding level upward           │
//! │       type = first `tax_type` set, from the deciding level upward       │
//! │       missing rate → 0, missing type → Percentage                       │
//! │                                                                         │
//! │  3. applicable == false:                                                │
//! │       rate = 0, type = None                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Levels *below* the deciding level never contribute a rate or type: an
//! item that only sets `rate` does not override anything.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::{TaxRate, TaxSettings, TaxType};

// =============================================================================
// Tax Descriptor
// =============================================================================

/// Resolved `{applicable, rate, type}`, independent of where the values
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxDescriptor {
    pub applicable: bool,
    pub rate: TaxRate,
    pub tax_type: Option<TaxType>,
}

impl TaxDescriptor {
    /// `{false, 0, None}`.
    #[inline]
    pub const fn not_applicable() -> Self {
        TaxDescriptor {
            applicable: false,
            rate: TaxRate::zero(),
            tax_type: None,
        }
    }

    /// An applicable descriptor.
    #[inline]
    pub const fn applicable(rate: TaxRate, tax_type: TaxType) -> Self {
        TaxDescriptor {
            applicable: true,
            rate,
            tax_type: Some(tax_type),
        }
    }
}

impl Default for TaxDescriptor {
    fn default() -> Self {
        TaxDescriptor::not_applicable()
    }
}

// =============================================================================
// Tax Source
// =============================================================================

/// Which level decided applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxSource {
    /// The entity's own override.
    Own,
    /// Inherited from the parent subcategory.
    SubCategory,
    /// Inherited from the category.
    Category,
    /// Nothing in the chain set applicability.
    Default,
}

impl fmt::Display for TaxSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxSource::Own => write!(f, "own"),
            TaxSource::SubCategory => write!(f, "sub_category"),
            TaxSource::Category => write!(f, "category"),
            TaxSource::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Inheritance Chain
// =============================================================================

/// One level of an inheritance chain, tagged with where it sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLevel {
    pub source: TaxSource,
    pub settings: TaxSettings,
}

impl ChainLevel {
    pub const fn new(source: TaxSource, settings: TaxSettings) -> Self {
        ChainLevel { source, settings }
    }
}

/// Outcome of a resolution: the descriptor plus the deciding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub descriptor: TaxDescriptor,
    pub source: TaxSource,
}

/// Resolves a tagged chain, nearest level first.
///
/// ## Example
/// ```rust
/// use taxon_core::tax::{resolve_chain, ChainLevel, TaxSource};
/// use taxon_core::types::{TaxRate, TaxSettings, TaxType};
///
/// let chain = [
///     ChainLevel::new(TaxSource::Own, TaxSettings::inherit()),
///     ChainLevel::new(
///         TaxSource::Category,
///         TaxSettings::explicit(true, TaxRate::from_bps(1000), Some(TaxType::Percentage)),
///     ),
/// ];
///
/// let resolution = resolve_chain(&chain);
/// assert_eq!(resolution.source, TaxSource::Category);
/// assert!(resolution.descriptor.applicable);
/// ```
pub fn resolve_chain(chain: &[ChainLevel]) -> Resolution {
    let Some(decider) = chain.iter().position(|level| level.settings.applicable.is_some()) else {
        return Resolution {
            descriptor: TaxDescriptor::not_applicable(),
            source: TaxSource::Default,
        };
    };

    let source = chain[decider].source;
    if chain[decider].settings.applicable != Some(true) {
        return Resolution {
            descriptor: TaxDescriptor::not_applicable(),
            source,
        };
    }

    let upward = &chain[decider..];
    let rate = upward
        .iter()
        .find_map(|level| level.settings.rate)
        .unwrap_or_default();
    let tax_type = upward
        .iter()
        .find_map(|level| level.settings.tax_type)
        .unwrap_or(TaxType::Percentage);

    Resolution {
        descriptor: TaxDescriptor::applicable(rate, tax_type),
        source,
    }
}

/// Resolves an entity's own settings against its ancestors, nearest first.
///
/// For an item: `ancestors = [subcategory, category]` (or `[category]` when
/// it hangs directly off the category). For a subcategory:
/// `ancestors = [category]`.
pub fn resolve(own: &TaxSettings, ancestors: &[TaxSettings]) -> TaxDescriptor {
    let mut chain = Vec::with_capacity(ancestors.len() + 1);
    chain.push(ChainLevel::new(TaxSource::Own, *own));

    // The furthest ancestor is always the category.
    let last = ancestors.len().saturating_sub(1);
    chain.extend(ancestors.iter().enumerate().map(|(idx, settings)| {
        let source = if idx == last {
            TaxSource::Category
        } else {
            TaxSource::SubCategory
        };
        ChainLevel::new(source, *settings)
    }));

    resolve_chain(&chain).descriptor
}

// =============================================================================
// Unit Tests
// =============================================================================
