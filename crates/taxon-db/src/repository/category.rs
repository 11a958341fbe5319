//! # Category Repository
//!
//! Database operations for categories, the root of the hierarchy.
//!
//! Category tax columns are never NULL: a category always states whether
//! tax applies, and the CHECK constraint enforces
//! `tax_applicable = 0 ⇒ tax_rate = 0 ∧ tax_type IS NULL`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{offset_to_column, rate_from_column, rate_to_column};
use crate::error::{DbError, DbResult};
use taxon_core::{Category, EntityKind, Page, Paged, TaxType};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    image: String,
    description: String,
    tax_applicable: bool,
    tax_rate: i64,
    tax_type: Option<TaxType>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = DbError;

    fn try_from(row: CategoryRow) -> DbResult<Self> {
        Ok(Category {
            id: row.id,
            name: row.name,
            image: row.image,
            description: row.description,
            tax_applicable: row.tax_applicable,
            tax_rate: rate_from_column(row.tax_rate)?,
            tax_type: row.tax_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Shared Queries
// =============================================================================

/// Deletes a category row. Returns the number of rows removed.
pub(crate) async fn delete<'e, E>(executor: E, id: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Gets a category by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Category))` - Category found
    /// * `Ok(None)` - Category not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, image, description,
                tax_applicable, tax_rate, tax_type,
                created_at, updated_at
            FROM categories
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Category::try_from).transpose()
    }

    /// Lists one page of categories ordered by name.
    pub async fn list(&self, page: Page) -> DbResult<Paged<Category>> {
        debug!(page = page.page, limit = page.limit, "Listing categories");

        let rows: Vec<CategoryRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, image, description,
                tax_applicable, tax_rate, tax_type,
                created_at, updated_at
            FROM categories
            ORDER BY name
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(i64::from(page.limit))
        .bind(offset_to_column(page.offset()))
        .fetch_all(&self.pool)
        .await?;

        let categories = rows
            .into_iter()
            .map(Category::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        let total = self.count().await?;

        Ok(Paged::new(categories, total.max(0) as u64, page))
    }

    /// Inserts a new category.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Name already taken
    pub async fn insert(&self, category: &Category) -> DbResult<()> {
        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query(
            r#"
            INSERT INTO categories (
                id, name, image, description,
                tax_applicable, tax_rate, tax_type,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9
            )
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.image)
        .bind(&category.description)
        .bind(category.tax_applicable)
        .bind(rate_to_column(category.tax_rate))
        .bind(category.tax_type)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing category (all mutable columns).
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Category doesn't exist
    pub async fn update(&self, category: &Category) -> DbResult<()> {
        debug!(id = %category.id, "Updating category");

        let result = sqlx::query(
            r#"
            UPDATE categories SET
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
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.image)
        .bind(&category.description)
        .bind(category.tax_applicable)
        .bind(rate_to_column(category.tax_rate))
        .bind(category.tax_type)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::Category, &category.id));
        }

        Ok(())
    }

    /// Counts categories (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use taxon_core::{CategoryTax, TaxRate};

    fn category(name: &str, tax: CategoryTax) -> Category {
        let now = Utc::now();
        let mut category = Category {
            id: generate_id(),
            name: name.to_string(),
            image: "https://img/category.png".to_string(),
            description: format!("{} category", name),
            tax_applicable: false,
            tax_rate: TaxRate::zero(),
            tax_type: None,
            created_at: now,
            updated_at: now,
        };
        category.set_tax(tax);
        category
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        let food = category(
            "Food",
            CategoryTax::applicable(TaxRate::from_bps(1000), TaxType::Percentage),
        );
        repo.insert(&food).await.unwrap();

        let loaded = repo.get_by_id(&food.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Food");
        assert!(loaded.tax_applicable);
        assert_eq!(loaded.tax_rate, TaxRate::from_bps(1000));
        assert_eq!(loaded.tax_type, Some(TaxType::Percentage));

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        repo.insert(&category("Drinks", CategoryTax::exempt()))
            .await
            .unwrap();
        let err = repo
            .insert(&category("Drinks", CategoryTax::exempt()))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_category() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .categories()
            .update(&category("Ghost", CategoryTax::exempt()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::NotFound {
                entity: EntityKind::Category,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_pages_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.categories();

        for name in ["Toys", "Books", "Garden"] {
            repo.insert(&category(name, CategoryTax::exempt())).await.unwrap();
        }

        let first = repo.list(Page::new(1, 2)).await.unwrap();
        let names: Vec<&str> = first.data.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Books", "Garden"]);
        assert_eq!(first.total, 3);
        assert_eq!(first.total_pages, 2);

        let second = repo.list(Page::new(2, 2)).await.unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.data[0].name, "Toys");

        let past_end = repo.list(Page::new(5, 2)).await.unwrap();
        assert!(past_end.is_empty());
        assert_eq!(past_end.total, 3);
    }
}
