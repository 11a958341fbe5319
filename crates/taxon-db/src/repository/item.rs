//! # Item Repository
//!
//! Database operations for items, the leaves of the hierarchy.
//!
//! ## Parent Columns
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  category_id      NOT NULL   always the owning category                 │
//! │  sub_category_id  NULL       set when the item sits under a subcategory │
//! │                                                                         │
//! │  find_by_category      → every item of the category (whole subtree)     │
//! │  find_by_sub_category  → items under one subcategory                    │
//! │  clear_sub_category    → re-parent items onto their category            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Partial updates go through [`ItemPatch`], built into a single `UPDATE`
//! with `sqlx::QueryBuilder`. Cascades write only `total_amount_cents`, and
//! only while the row still holds the [`TotalBasis`] the total came from.
//!
//! Listings join the item's parents so `tax_applicable` filters on the
//! effective value: the first non-NULL of item, subcategory and category.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

use super::{offset_to_column, rate_to_column, settings_from_columns};
use crate::error::{DbError, DbResult};
use crate::store::{ItemPatch, TotalBasis};
use taxon_core::{EntityKind, Item, ItemFilter, Money, Page, Paged, TaxType};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct ItemRow {
    id: String,
    name: String,
    image: String,
    description: String,
    category_id: String,
    sub_category_id: Option<String>,
    base_amount_cents: i64,
    discount_cents: i64,
    tax_applicable: Option<bool>,
    tax_rate: Option<i64>,
    tax_type: Option<TaxType>,
    total_amount_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = DbError;

    fn try_from(row: ItemRow) -> DbResult<Self> {
        Ok(Item {
            id: row.id,
            name: row.name,
            image: row.image,
            description: row.description,
            category_id: row.category_id,
            sub_category_id: row.sub_category_id,
            base_amount_cents: row.base_amount_cents,
            discount_cents: row.discount_cents,
            tax: settings_from_columns(row.tax_applicable, row.tax_rate, row.tax_type)?,
            total_amount_cents: row.total_amount_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_items(rows: Vec<ItemRow>) -> DbResult<Vec<Item>> {
    rows.into_iter().map(Item::try_from).collect()
}

// =============================================================================
// Shared Queries
// =============================================================================
// Enumeration order is insertion order, so cascade batches are stable.

/// Every item whose category is `category_id`, with or without a subcategory.
pub(crate) async fn find_by_category<'e, E>(executor: E, category_id: &str) -> DbResult<Vec<Item>>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<ItemRow> = sqlx::query_as(
        r#"
        SELECT
            id, name, image, description, category_id, sub_category_id,
            base_amount_cents, discount_cents,
            tax_applicable, tax_rate, tax_type,
            total_amount_cents, created_at, updated_at
        FROM items
        WHERE category_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(category_id)
    .fetch_all(executor)
    .await?;

    into_items(rows)
}

/// Items under one subcategory.
pub(crate) async fn find_by_sub_category<'e, E>(
    executor: E,
    sub_category_id: &str,
) -> DbResult<Vec<Item>>
where
    E: SqliteExecutor<'e>,
{
    let rows: Vec<ItemRow> = sqlx::query_as(
        r#"
        SELECT
            id, name, image, description, category_id, sub_category_id,
            base_amount_cents, discount_cents,
            tax_applicable, tax_rate, tax_type,
            total_amount_cents, created_at, updated_at
        FROM items
        WHERE sub_category_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(sub_category_id)
    .fetch_all(executor)
    .await?;

    into_items(rows)
}

pub(crate) async fn count_by_category<'e, E>(executor: E, category_id: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE category_id = ?1")
        .bind(category_id)
        .fetch_one(executor)
        .await?;

    Ok(count.max(0) as u64)
}

pub(crate) async fn count_by_sub_category<'e, E>(
    executor: E,
    sub_category_id: &str,
) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE sub_category_id = ?1")
        .bind(sub_category_id)
        .fetch_one(executor)
        .await?;

    Ok(count.max(0) as u64)
}

/// Moves every item of a subcategory onto its category. Returns the number
/// of items moved.
pub(crate) async fn clear_sub_category<'e, E>(executor: E, sub_category_id: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE items SET
            sub_category_id = NULL,
            updated_at = ?2
        WHERE sub_category_id = ?1
        "#,
    )
    .bind(sub_category_id)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Listing
// =============================================================================

const LIST_FROM: &str = r#"
    FROM items i
    LEFT JOIN sub_categories s ON s.id = i.sub_category_id
    INNER JOIN categories c ON c.id = i.category_id
    WHERE 1 = 1"#;

/// `%`, `_` and the escape character itself match literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ItemFilter) {
    if let Some(category_id) = &filter.category_id {
        builder.push(" AND i.category_id = ").push_bind(category_id.clone());
    }
    if let Some(sub_category_id) = &filter.sub_category_id {
        builder
            .push(" AND i.sub_category_id = ")
            .push_bind(sub_category_id.clone());
    }
    if let Some(applicable) = filter.tax_applicable {
        builder
            .push(" AND COALESCE(i.tax_applicable, s.tax_applicable, c.tax_applicable) = ")
            .push_bind(applicable);
    }
    if let Some(min) = filter.min_total_cents {
        builder.push(" AND i.total_amount_cents >= ").push_bind(min);
    }
    if let Some(max) = filter.max_total_cents {
        builder.push(" AND i.total_amount_cents <= ").push_bind(max);
    }
    if let Some(term) = filter.search_term() {
        builder
            .push(" AND i.name LIKE ")
            .push_bind(like_pattern(term))
            .push(" ESCAPE '\\'");
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Gets an item by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as(
            r#"
            SELECT
                id, name, image, description, category_id, sub_category_id,
                base_amount_cents, discount_cents,
                tax_applicable, tax_rate, tax_type,
                total_amount_cents, created_at, updated_at
            FROM items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Item::try_from).transpose()
    }

    pub async fn find_by_category(&self, category_id: &str) -> DbResult<Vec<Item>> {
        find_by_category(&self.pool, category_id).await
    }

    pub async fn find_by_sub_category(&self, sub_category_id: &str) -> DbResult<Vec<Item>> {
        find_by_sub_category(&self.pool, sub_category_id).await
    }

    pub async fn count_by_category(&self, category_id: &str) -> DbResult<u64> {
        count_by_category(&self.pool, category_id).await
    }

    pub async fn count_by_sub_category(&self, sub_category_id: &str) -> DbResult<u64> {
        count_by_sub_category(&self.pool, sub_category_id).await
    }

    /// Inserts a new item. The total must already be computed.
    pub async fn insert(&self, item: &Item) -> DbResult<()> {
        debug!(
            id = %item.id,
            category_id = %item.category_id,
            sub_category_id = ?item.sub_category_id,
            "Inserting item"
        );

        sqlx::query(
            r#"
            INSERT INTO items (
                id, name, image, description, category_id, sub_category_id,
                base_amount_cents, discount_cents,
                tax_applicable, tax_rate, tax_type,
                total_amount_cents, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.image)
        .bind(&item.description)
        .bind(&item.category_id)
        .bind(&item.sub_category_id)
        .bind(item.base_amount_cents)
        .bind(item.discount_cents)
        .bind(item.tax.applicable)
        .bind(item.tax.rate.map(rate_to_column))
        .bind(item.tax.tax_type)
        .bind(item.total_amount_cents)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies a partial update and returns the stored item.
    ///
    /// ## Returns
    /// * `Ok(Item)` - Updated item as stored
    /// * `Err(DbError::NotFound)` - Item doesn't exist
    pub async fn update(&self, id: &str, patch: &ItemPatch) -> DbResult<Item> {
        debug!(id = %id, fields = patch.field_count(), "Patching item");

        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE items SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(name) = &patch.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(image) = &patch.image {
            builder.push(", image = ").push_bind(image.clone());
        }
        if let Some(description) = &patch.description {
            builder.push(", description = ").push_bind(description.clone());
        }
        if let Some(base_amount_cents) = patch.base_amount_cents {
            builder.push(", base_amount_cents = ").push_bind(base_amount_cents);
        }
        if let Some(discount_cents) = patch.discount_cents {
            builder.push(", discount_cents = ").push_bind(discount_cents);
        }
        if let Some(tax) = patch.tax {
            builder.push(", tax_applicable = ").push_bind(tax.applicable);
            builder.push(", tax_rate = ").push_bind(tax.rate.map(rate_to_column));
            builder.push(", tax_type = ").push_bind(tax.tax_type);
        }
        if let Some(total_amount_cents) = patch.total_amount_cents {
            builder.push(", total_amount_cents = ").push_bind(total_amount_cents);
        }

        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::Item, id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(EntityKind::Item, id))
    }

    /// Writes a recomputed total, conditioned on the amounts and own tax it
    /// was computed from.
    ///
    /// ## Returns
    /// * `Ok(true)` - Total written
    /// * `Ok(false)` - The row changed since `basis` was read; nothing written
    /// * `Err(DbError::NotFound)` - Item doesn't exist
    pub async fn update_total(&self, id: &str, basis: &TotalBasis, total: Money) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE items SET
                total_amount_cents = ?2,
                updated_at = ?3
            WHERE id = ?1
              AND base_amount_cents = ?4
              AND discount_cents = ?5
              AND tax_applicable IS ?6
              AND tax_rate IS ?7
              AND tax_type IS ?8
            "#,
        )
        .bind(id)
        .bind(total.cents())
        .bind(Utc::now())
        .bind(basis.base_amount_cents)
        .bind(basis.discount_cents)
        .bind(basis.tax.applicable)
        .bind(basis.tax.rate.map(rate_to_column))
        .bind(basis.tax.tax_type)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(id = %id, total = %total, "Item total written");
            return Ok(true);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => {
                debug!(id = %id, "Item changed since read, total not written");
                Ok(false)
            }
            None => Err(DbError::not_found(EntityKind::Item, id)),
        }
    }

    /// Lists one page of items matching `filter`.
    pub async fn list(&self, filter: &ItemFilter, page: Page) -> DbResult<Paged<Item>> {
        debug!(?filter, page = page.page, limit = page.limit, "Listing items");

        let mut count_query: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT COUNT(*)");
        count_query.push(LIST_FROM);
        push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut select: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                i.id, i.name, i.image, i.description, i.category_id, i.sub_category_id,
                i.base_amount_cents, i.discount_cents,
                i.tax_applicable, i.tax_rate, i.tax_type,
                i.total_amount_cents, i.created_at, i.updated_at"#,
        );
        select.push(LIST_FROM);
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY i.rowid LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(offset_to_column(page.offset()));

        let rows: Vec<ItemRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Paged::new(into_items(rows)?, total.max(0) as u64, page))
    }

    /// Hard-deletes an item.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting item");

        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(EntityKind::Item, id));
        }

        Ok(())
    }

    /// Counts all items (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
