//! # SubCategory Repository
//!
//! Database operations for subcategories.
//!
//! Tax columns are nullable. A NULL `tax_applicable` means the subcategory
//! inherits from its category and is therefore reached by category cascades.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{rate_to_column, settings_from_columns};
use crate::error::{DbError, DbResult};
use taxon_core::{EntityKind, SubCategory, TaxType};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct SubCategoryRow {
    id: String,
    name: String,
    image: String,
    description: String,
    category_id: String,
    tax_applicable: Option<bool>,
    tax_rate: Option<i64>,
    tax_type: Option<TaxType>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubCategoryRow> for SubCategory {
    type Error = DbError;

    fn try_from(row: SubCategoryRow) -> DbResult<Self> {
        Ok(SubCategory {
            id: row.id,
            name: row.name,
            image: row.image,
            description: row.description,
            category_id: row.category_id,
            tax: settings_from_columns(row.tax_applicable, row.tax_rate, row.tax_type)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Shared Queries
// =============================================================================
// Used both through the pool and inside a StoreTransaction.

/// All subcategories of a category, in insertion order.
pub(crate) async fn find_by_category<'e, E>(
    executor: E,
    category_id: &str,
) -> DbResult<Vec<SubCategory>>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<SubCategoryRow> = sqlx::query_as(
        r#"
        SELECT
            id, name, image, description, category_id,
            tax_applicable, tax_rate, tax_type,
            created_at, updated_at
        FROM sub_categories
        WHERE category_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(category_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(SubCategory::try_from).collect()
}

/// Deletes one subcategory row.
pub(crate) async fn delete<'e, E>(executor: E, id: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM sub_categories WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Deletes every subcategory of a category.
pub(crate) async fn delete_by_category<'e, E>(executor: E, category_id: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM sub_categories WHERE category_id = ?1")
        .bind(category_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for subcategory database operations.
#[derive(Debug, Clone)]
pub struct SubCategoryRepository {
    pool: SqlitePool,
}

impl SubCategoryRepository {
    /// Creates a new SubCategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SubCategoryRepository { pool }
    }

    /// Gets a subcategory by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SubCategory>> {
        let row: Option<SubCategoryRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, image, description, category_id,
                tax_applicable, tax_rate, tax_type,
                created_at, updated_at
            FROM sub_categories
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SubCategory::try_from).transpose()
    }

    /// Lists the subcategories of a category.
    pub async fn find_by_category(&self, category_id: &str) -> DbResult<Vec<SubCategory>> {
        find_by_category(&self.pool, category_id).await
    }

    /// Inserts a new subcategory.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Name already used in this category
    /// * `Err(DbError::ForeignKeyViolation)` - Category doesn't exist
    pub async fn insert(&self, sub_category: &SubCategory) -> DbResult<()> {
        debug!(
            id = %sub_category.id,
            category_id = %sub_category.category_id,
            "Inserting subcategory"
        );

        sqlx::query(
            r#"
            INSERT INTO sub_categories (
                id, name, image, description, category_id,
                tax_applicable, tax_rate, tax_type,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10
            )
            "#,
        )
        .bind(&sub_category.id)
        .bind(&sub_category.name)
        .bind(&sub_category.image)
        .bind(&sub_category.description)
        .bind(&sub_category.category_id)
        .bind(sub_category.tax.applicable)
        .bind(sub_category.tax.rate.map(rate_to_column))
        .bind(sub_category.tax.tax_type)
        .bind(sub_category.created_at)
        .bind(sub_category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing subcategory. The category reference is immutable
    /// and not written.
    pub async fn update(&self, sub_category: &SubCategory) -> DbResult<()> {
        debug!(id = %sub_category.id, "Updating subcategory");

        let result = sqlx::query(
            r#"
            UPDATE sub_categories SET
                name = ?2,
                image = ?3,
                description = ?4,
                tax_applicable = ?5,
                tax_rate = ?6,
                tax_type = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&sub_category.id)
        .bind(&sub_category.name)
        .bind(&sub_category.image)
        .bind(&sub_category.description)
        .bind(sub_category.tax.applicable)
        .bind(sub_category.tax.rate.map(rate_to_column))
        .bind(sub_category.tax.tax_type)
        .bind(sub_category.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::SubCategory, &sub_category.id));
        }

        Ok(())
    }

    /// Counts subcategories.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sub_categories")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
