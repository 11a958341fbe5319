//! # Error Types
//!
//! Domain-specific error types for taxon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  taxon-core errors (this file)                                         │
//! │  ├── CoreError        - Amount and ancestry rule violations            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  taxon-db errors (separate crate)                                      │
//! │  └── DbError          - Store operation failures                       │
//! │                                                                         │
//! │  taxon-cascade errors                                                  │
//! │  └── CascadeError     - What the request layer sees                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CascadeError → request layer      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::EntityKind;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Both the resolver and the calculator fail fast: these errors belong to the
/// single operation that raised them and are never collected.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Base amount or discount breaks the amount rules.
    ///
    /// ## When This Occurs
    /// - `base_amount < 0` or `discount < 0`
    /// - `discount >= base_amount`
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A referenced ancestor does not exist, or the references disagree.
    ///
    /// ## When This Occurs
    /// - Item points at a SubCategory that was deleted
    /// - SubCategory points at a missing Category
    /// - Item names a Category that is not its SubCategory's Category
    #[error("Invalid ancestor: {entity} {id} does not resolve")]
    InvalidAncestor { entity: EntityKind, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Creates an InvalidAncestor error.
    pub fn invalid_ancestor(entity: EntityKind, id: impl Into<String>) -> Self {
        CoreError::InvalidAncestor {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Tax fields contradict each other.
    #[error("Inconsistent tax settings: {reason}")]
    InconsistentTax { reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
