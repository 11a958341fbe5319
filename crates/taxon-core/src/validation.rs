//! # Validation Module
//!
//! Business rule validation for catalog inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request layer                                                │
//! │  └── Deserialization into NewItem / CategoryChanges / ...              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (called by the Catalog service)                  │
//! │  ├── Names, images, descriptions                                       │
//! │  ├── Tax settings consistency                                          │
//! │  └── Amount rules (shared with the Total Calculator)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE names, CHECK amounts                                       │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use taxon_core::validation::{validate_category_tax, validate_name};
//! use taxon_core::types::{CategoryTax, TaxRate, TaxType};
//!
//! validate_name("name", "Beverages").unwrap();
//! validate_category_tax(&CategoryTax::applicable(TaxRate::from_bps(1000), TaxType::Percentage)).unwrap();
//! ```

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::total::validate_amounts;
use crate::types::{
    CategoryTax, NewCategory, NewItem, NewSubCategory, TaxSettings, TaxType,
};
use crate::{MAX_NAME_LEN, MAX_PERCENTAGE_BPS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `MAX_NAME_LEN` characters
///
/// ```rust
/// use taxon_core::validation::validate_name;
///
/// assert!(validate_name("name", "Soft Drinks").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a required free-text field (image URL, description).
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Tax Validators
// =============================================================================

/// Validates a category's tax input.
///
/// ## Rules
/// - Applicable → rate and type are both required
/// - Percentage rates at most 100%
/// - Not applicable → rate and type are ignored (normalized away later)
pub fn validate_category_tax(tax: &CategoryTax) -> ValidationResult<()> {
    if !tax.applicable {
        return Ok(());
    }

    if tax.rate.is_none() {
        return Err(ValidationError::Required {
            field: "tax_rate".to_string(),
        });
    }

    if tax.tax_type.is_none() {
        return Err(ValidationError::Required {
            field: "tax_type".to_string(),
        });
    }

    validate_tax_settings(&tax.into_settings())
}

/// Validates optional per-entity tax settings.
///
/// ## Rules
/// - A percentage rate set on the same level must not exceed 100%
/// - Explicitly not applicable with a non-zero rate is contradictory
/// - Explicitly applicable needs its own rate and type, so an own override
///   never depends on an ancestor
pub fn validate_tax_settings(settings: &TaxSettings) -> ValidationResult<()> {
    if settings.applicable == Some(true) {
        if settings.rate.is_none() {
            return Err(ValidationError::Required {
                field: "tax_rate".to_string(),
            });
        }
        if settings.tax_type.is_none() {
            return Err(ValidationError::Required {
                field: "tax_type".to_string(),
            });
        }
    }

    if settings.applicable == Some(false) {
        let has_rate = settings.rate.is_some_and(|rate| !rate.is_zero());
        if has_rate || settings.tax_type.is_some() {
            return Err(ValidationError::InconsistentTax {
                reason: "tax is not applicable but a rate or type was given".to_string(),
            });
        }
    }

    if let (Some(rate), Some(TaxType::Percentage)) = (settings.rate, settings.tax_type) {
        if rate.hundredths() > MAX_PERCENTAGE_BPS {
            return Err(ValidationError::OutOfRange {
                field: "tax_rate".to_string(),
                min: 0,
                max: MAX_PERCENTAGE_BPS as i64,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

/// Validates a new category.
pub fn validate_new_category(input: &NewCategory) -> ValidationResult<()> {
    validate_name("name", &input.name)?;
    validate_required("image", &input.image)?;
    validate_required("description", &input.description)?;
    validate_category_tax(&input.tax)
}

/// Validates a new subcategory. The category reference is checked against
/// the store by the caller.
pub fn validate_new_sub_category(input: &NewSubCategory) -> ValidationResult<()> {
    validate_uuid(&input.category_id)?;
    validate_name("name", &input.name)?;
    validate_required("image", &input.image)?;
    validate_required("description", &input.description)?;
    validate_tax_settings(&input.tax)
}

/// Validates a new item, including the amount rules.
pub fn validate_new_item(input: &NewItem) -> CoreResult<()> {
    if input.category_id.is_none() && input.sub_category_id.is_none() {
        return Err(ValidationError::Required {
            field: "category_id or sub_category_id".to_string(),
        }
        .into());
    }

    for id in [&input.category_id, &input.sub_category_id].into_iter().flatten() {
        validate_uuid(id)?;
    }

    validate_name("name", &input.name)?;
    validate_required("image", &input.image)?;
    validate_required("description", &input.description)?;
    validate_tax_settings(&input.tax)?;
    validate_amounts(
        Money::from_cents(input.base_amount_cents),
        Money::from_cents(input.discount_cents),
    )
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ```rust
/// use taxon_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
