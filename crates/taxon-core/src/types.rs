//! # Domain Types
//!
//! Core domain types used throughout Taxon.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │◄──│  SubCategory    │◄──│      Item       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  tax_applicable │   │  category_id    │   │  category_id    │       │
//! │  │  tax_rate       │   │  tax: Settings  │   │  sub_category_id│       │
//! │  │  tax_type       │   │  (all optional) │   │  base / discount│       │
//! │  │  (always set)   │   │                 │   │  tax: Settings  │       │
//! │  └─────────────────┘   └─────────────────┘   │  total (derived)│       │
//! │                                              └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    TaxRate      │   │    TaxType      │                             │
//! │  │  hundredths     │   │  Percentage     │                             │
//! │  │  1000 = 10%     │   │  Fixed          │                             │
//! │  │  500  = $5.00   │   └─────────────────┘                             │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Own Override
//! A SubCategory or Item carries its own tax only when `tax.applicable` is
//! set. That single stored flag decides whether a cascade may rewrite the
//! item; the rate and type fields alone never make an override.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Entity Kind
// =============================================================================

/// The three levels of the hierarchy, used in error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum EntityKind {
    Category,
    SubCategory,
    Item,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Category => write!(f, "Category"),
            EntityKind::SubCategory => write!(f, "SubCategory"),
            EntityKind::Item => write!(f, "Item"),
        }
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in hundredths of its unit.
///
/// ## Unit Depends on TaxType
/// - `Percentage`: basis points, 1000 = 10.00%
/// - `Fixed`: cents, 500 = $5.00
///
/// A single number type keeps field-level fallback well defined: a rate
/// inherited from one level may be paired with a type from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a rate from hundredths (basis points or cents).
    #[inline]
    pub const fn from_hundredths(hundredths: u32) -> Self {
        TaxRate(hundredths)
    }

    /// Creates a percentage rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a rate from a decimal number (10.0 = 10% or $10.00).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    /// Creates a fixed rate from a money amount. Negative amounts become zero.
    pub fn from_fixed(amount: Money) -> Self {
        TaxRate(amount.cents().clamp(0, u32::MAX as i64) as u32)
    }

    /// Returns the raw hundredths value.
    #[inline]
    pub const fn hundredths(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a decimal number (for display only).
    #[inline]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Interprets the rate as a fixed amount.
    #[inline]
    pub const fn as_fixed_amount(&self) -> Money {
        Money::from_cents(self.0 as i64)
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax Type
// =============================================================================

/// How a rate turns into a tax amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// `rate / 100` percent of the base amount.
    Percentage,
    /// `rate` cents, regardless of the base amount.
    Fixed,
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxType::Percentage => write!(f, "percentage"),
            TaxType::Fixed => write!(f, "fixed"),
        }
    }
}

impl FromStr for TaxType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percentage" => Ok(TaxType::Percentage),
            "fixed" => Ok(TaxType::Fixed),
            other => Err(ValidationError::InvalidFormat {
                field: "tax_type".to_string(),
                reason: format!("'{}' is not one of: percentage, fixed", other),
            }),
        }
    }
}

// =============================================================================
// Tax Settings
// =============================================================================

/// Per-entity tax fields, each independently optional.
///
/// `None` means "unset here, inherit from the next level up" and is resolved
/// at read time, never copied down at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxSettings {
    #[serde(default)]
    pub applicable: Option<bool>,
    #[serde(default)]
    pub rate: Option<TaxRate>,
    #[serde(default)]
    pub tax_type: Option<TaxType>,
}

impl TaxSettings {
    /// All fields unset: everything is inherited.
    #[inline]
    pub const fn inherit() -> Self {
        TaxSettings {
            applicable: None,
            rate: None,
            tax_type: None,
        }
    }

    /// All fields set explicitly, normalized.
    pub fn explicit(applicable: bool, rate: TaxRate, tax_type: Option<TaxType>) -> Self {
        TaxSettings {
            applicable: Some(applicable),
            rate: Some(rate),
            tax_type,
        }
        .normalized()
    }

    /// Explicitly tax-exempt.
    #[inline]
    pub const fn exempt() -> Self {
        TaxSettings {
            applicable: Some(false),
            rate: Some(TaxRate::zero()),
            tax_type: None,
        }
    }

    /// True when this entity carries its own tax (own override).
    #[inline]
    pub const fn has_override(&self) -> bool {
        self.applicable.is_some()
    }

    /// Enforces `applicable == false ⇒ rate == 0 ∧ type == None`.
    pub fn normalized(self) -> Self {
        match self.applicable {
            Some(false) => TaxSettings::exempt(),
            _ => self,
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// Root of the hierarchy. Tax fields are always set here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, unique across categories.
    pub name: String,

    /// Image URL.
    pub image: String,

    pub description: String,

    pub tax_applicable: bool,

    /// Zero when `tax_applicable` is false.
    pub tax_rate: TaxRate,

    /// `None` when `tax_applicable` is false.
    pub tax_type: Option<TaxType>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// The category's tax as a fully-set settings level.
    pub fn tax_settings(&self) -> TaxSettings {
        TaxSettings::explicit(self.tax_applicable, self.tax_rate, self.tax_type)
    }

    /// Replaces the tax fields, keeping the not-applicable invariant.
    pub fn set_tax(&mut self, tax: CategoryTax) {
        let settings = tax.into_settings();
        self.tax_applicable = settings.applicable.unwrap_or(false);
        self.tax_rate = settings.rate.unwrap_or_default();
        self.tax_type = settings.tax_type;
    }
}

// =============================================================================
// SubCategory
// =============================================================================

/// Middle level. Owned by exactly one Category for its whole life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SubCategory {
    pub id: String,

    /// Unique within its category.
    pub name: String,

    pub image: String,

    pub description: String,

    /// Owning category (immutable).
    pub category_id: String,

    /// Own tax fields; unset fields inherit from the category.
    pub tax: TaxSettings,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SubCategory {
    /// True when the subcategory decides its own applicability.
    #[inline]
    pub fn has_tax_override(&self) -> bool {
        self.tax.has_override()
    }
}

// =============================================================================
// Item
// =============================================================================

/// Leaf level. `total_amount_cents` is derived and never taken from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Item {
    pub id: String,

    pub name: String,

    pub image: String,

    pub description: String,

    /// Category, always recorded. For items under a subcategory this is the
    /// subcategory's category.
    pub category_id: String,

    /// Present when the item sits under a subcategory.
    pub sub_category_id: Option<String>,

    /// Base amount in cents (>= 0).
    pub base_amount_cents: i64,

    /// Discount in cents (>= 0, < base amount).
    pub discount_cents: i64,

    /// Own tax fields; unset fields inherit.
    pub tax: TaxSettings,

    /// `max(0, base - discount + tax)`, in cents.
    pub total_amount_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the base amount as Money.
    #[inline]
    pub fn base_amount(&self) -> Money {
        Money::from_cents(self.base_amount_cents)
    }

    /// Returns the discount as Money.
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// Returns the stored total as Money.
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// True when the item carries its own tax and must not be rewritten by
    /// a cascade.
    #[inline]
    pub fn has_tax_override(&self) -> bool {
        self.tax.has_override()
    }

    /// True when the item hangs directly off its category.
    #[inline]
    pub fn is_directly_under_category(&self) -> bool {
        self.sub_category_id.is_none()
    }
}

// =============================================================================
// Command Inputs
// =============================================================================
// Shapes the request layer hands to the Catalog service. Totals and
// timestamps are never part of an input.

/// Category tax as submitted: rate and type are required iff applicable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryTax {
    pub applicable: bool,
    #[serde(default)]
    pub rate: Option<TaxRate>,
    #[serde(default)]
    pub tax_type: Option<TaxType>,
}

impl CategoryTax {
    /// Applicable tax with the given rate and type.
    pub const fn applicable(rate: TaxRate, tax_type: TaxType) -> Self {
        CategoryTax {
            applicable: true,
            rate: Some(rate),
            tax_type: Some(tax_type),
        }
    }

    /// No tax.
    pub const fn exempt() -> Self {
        CategoryTax {
            applicable: false,
            rate: None,
            tax_type: None,
        }
    }

    /// Fully-set settings level, normalized.
    pub fn into_settings(self) -> TaxSettings {
        TaxSettings::explicit(self.applicable, self.rate.unwrap_or_default(), self.tax_type)
    }
}

/// Input for creating a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub image: String,
    pub description: String,
    pub tax: CategoryTax,
}

/// Input for creating a subcategory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubCategory {
    pub category_id: String,
    pub name: String,
    pub image: String,
    pub description: String,
    #[serde(default)]
    pub tax: TaxSettings,
}

/// Input for creating an item. At least one parent reference is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub image: String,
    pub description: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub sub_category_id: Option<String>,
    pub base_amount_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub tax: TaxSettings,
}

/// Partial update of a category. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub tax: Option<CategoryTax>,
}

/// Partial update of a subcategory. `tax: Some(TaxSettings::inherit())`
/// drops the override.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubCategoryChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub tax: Option<TaxSettings>,
}

/// Partial update of an item. Parent references are immutable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub base_amount_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub tax: Option<TaxSettings>,
}

impl ItemChanges {
    /// True when the change can move the item's total.
    pub fn touches_total(&self) -> bool {
        self.base_amount_cents.is_some() || self.discount_cents.is_some() || self.tax.is_some()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
