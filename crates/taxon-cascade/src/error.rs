//! # Cascade Error Types
//!
//! Error types surfaced by the catalog service, the propagator and the
//! deletion guard.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cascade Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Client (400)   │  │  Lookup (404)   │  │   Conflict (409)        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidAmount  │  │  NotFound       │  │  HasChildren            │ │
//! │  │  InvalidAncestor│  │                 │  │  Duplicate              │ │
//! │  │  Validation     │  │                 │  │  ConcurrentModification │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │ Cascade (warn)  │  │  Configuration  │  │   Infrastructure (500)  │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Incomplete     │  │  InvalidConfig  │  │  Database               │ │
//! │  │   Cascade       │  │  ConfigLoad     │  │  Internal               │ │
//! │  │  PerItemFailure │  │  ConfigSave     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `IncompleteCascade` is a warning: the change that triggered the cascade
//! is committed and the caller gets a success response carrying it.

use thiserror::Error;

use taxon_core::{CoreError, EntityKind, ValidationError};
use taxon_db::DbError;

/// Result type alias for cascade operations.
pub type CascadeResult<T> = Result<T, CascadeError>;

/// Error type for every taxon-cascade operation.
#[derive(Debug, Error)]
pub enum CascadeError {
    // =========================================================================
    // Client Errors
    // =========================================================================
    /// Amount rules broken.
    ///
    /// ## When This Occurs
    /// - Negative base amount or discount
    /// - Discount not strictly below the base amount
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// A parent reference does not resolve.
    ///
    /// ## When This Occurs
    /// - Creating a subcategory under a missing category
    /// - Creating an item under a missing subcategory/category
    /// - An item's subcategory disappeared between load and resolve
    #[error("Invalid ancestor: {entity} {id} does not resolve")]
    InvalidAncestor { entity: EntityKind, id: String },

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// The target of an operation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    /// Delete refused because items still hang below the entity.
    #[error("{entity} {id} still has {items} item(s)")]
    HasChildren {
        entity: EntityKind,
        id: String,
        items: u64,
    },

    /// A unique name is already taken.
    #[error("Duplicate {field}: '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// The entity kept changing underneath a read-compute-write cycle.
    ///
    /// ## When This Occurs
    /// - Every recompute attempt of an item lost the race against an edit
    #[error("{entity} {id} changed concurrently")]
    ConcurrentModification { entity: EntityKind, id: String },

    // =========================================================================
    // Cascade Warnings
    // =========================================================================
    /// The triggering change was committed but some dependents were not
    /// recomputed.
    #[error(
        "Cascade incomplete: {} item(s) failed, {} item(s) abandoned",
        .failed.len(),
        .abandoned.len()
    )]
    IncompleteCascade {
        failed: Vec<String>,
        abandoned: Vec<String>,
    },

    /// A single item could not be recomputed. Collected into a cascade
    /// report, never raised on its own by the propagator.
    #[error("Recompute failed for item {item_id}: {reason}")]
    PerItemRecomputeFailure { item_id: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid cascade configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Store operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for CascadeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAmount { reason } => CascadeError::InvalidAmount { reason },
            CoreError::InvalidAncestor { entity, id } => {
                CascadeError::InvalidAncestor { entity, id }
            }
            CoreError::Validation(v) => CascadeError::Validation(v),
        }
    }
}

impl From<DbError> for CascadeError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CascadeError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => CascadeError::Duplicate { field, value },
            other => CascadeError::Database(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CascadeError {
    fn from(err: std::io::Error) -> Self {
        CascadeError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CascadeError {
    fn from(err: toml::de::Error) -> Self {
        CascadeError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CascadeError {
    fn from(err: toml::ser::Error) -> Self {
        CascadeError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Helpers & Categorization
// =============================================================================

impl CascadeError {
    /// Creates a NotFound error.
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        CascadeError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an InvalidAncestor error.
    pub fn invalid_ancestor(entity: EntityKind, id: impl Into<String>) -> Self {
        CascadeError::InvalidAncestor {
            entity,
            id: id.into(),
        }
    }

    /// HTTP-style status for the request layer.
    ///
    /// `IncompleteCascade` maps to 200: the primary change succeeded.
    pub fn status_code(&self) -> u16 {
        match self {
            CascadeError::InvalidAmount { .. }
            | CascadeError::InvalidAncestor { .. }
            | CascadeError::Validation(_) => 400,
            CascadeError::NotFound { .. } => 404,
            CascadeError::HasChildren { .. }
            | CascadeError::Duplicate { .. }
            | CascadeError::ConcurrentModification { .. } => 409,
            CascadeError::IncompleteCascade { .. } => 200,
            _ => 500,
        }
    }

    /// True when the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// True for errors that accompany a successful primary change.
    pub fn is_warning(&self) -> bool {
        matches!(self, CascadeError::IncompleteCascade { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CascadeError::InvalidConfig(_)
                | CascadeError::ConfigLoadFailed(_)
                | CascadeError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CascadeError::InvalidAmount {
                reason: "discount".into()
            }
            .status_code(),
            400
        );
        assert_eq!(
            CascadeError::not_found(EntityKind::Item, "i-1").status_code(),
            404
        );
        assert_eq!(
            CascadeError::HasChildren {
                entity: EntityKind::Category,
                id: "c-1".into(),
                items: 3,
            }
            .status_code(),
            409
        );
        assert_eq!(
            CascadeError::IncompleteCascade {
                failed: vec![],
                abandoned: vec!["i-1".into()],
            }
            .status_code(),
            200
        );
        assert_eq!(
            CascadeError::ConcurrentModification {
                entity: EntityKind::Item,
                id: "i-1".into(),
            }
            .status_code(),
            409
        );
        assert_eq!(CascadeError::Database("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_core_errors_keep_their_meaning() {
        let err: CascadeError = CoreError::invalid_amount("discount too large").into();
        assert!(matches!(err, CascadeError::InvalidAmount { .. }));
        assert!(err.is_client_error());

        let err: CascadeError = CoreError::invalid_ancestor(EntityKind::SubCategory, "s-1").into();
        assert!(matches!(
            err,
            CascadeError::InvalidAncestor {
                entity: EntityKind::SubCategory,
                ..
            }
        ));
    }

    #[test]
    fn test_db_errors_map_to_lookup_and_conflict() {
        let err: CascadeError = DbError::not_found(EntityKind::Category, "c-9").into();
        assert!(matches!(err, CascadeError::NotFound { .. }));

        let err: CascadeError = DbError::UniqueViolation {
            field: "name".into(),
            value: "Beverages".into(),
        }
        .into();
        assert_eq!(err.status_code(), 409);

        let err: CascadeError = DbError::QueryFailed("CHECK constraint failed".into()).into();
        assert!(matches!(err, CascadeError::Database(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_incomplete_cascade_display() {
        let err = CascadeError::IncompleteCascade {
            failed: vec!["a".into()],
            abandoned: vec!["b".into(), "c".into()],
        };
        assert!(err.is_warning());
        assert_eq!(
            err.to_string(),
            "Cascade incomplete: 1 item(s) failed, 2 item(s) abandoned"
        );
    }
}
