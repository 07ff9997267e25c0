//! Category repository.

use futures::stream::BoxStream;
use sqlx::SqlitePool;

use tekmart_core::CategoryId;

use super::events::{self, ChangeNotifier, Table};
use super::{StoreError, map_write_error};
use crate::models::Category;

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    icon_url: Option<String>,
    sort_order: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            icon_url: row.icon_url,
            sort_order: row.sort_order,
        }
    }
}

/// Repository for catalog categories.
pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
    events: &'a ChangeNotifier,
}

impl<'a> CategoryRepository<'a> {
    pub(crate) const fn new(pool: &'a SqlitePool, events: &'a ChangeNotifier) -> Self {
        Self { pool, events }
    }

    /// All categories in display order (`sort_order` ascending).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, StoreError> {
        fetch_all(self.pool).await
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn get(&self, id: &CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, icon_url, sort_order FROM categories WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    /// Insert a category, or replace every field of an existing one with the
    /// same ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn upsert(&self, category: &Category) -> Result<(), StoreError> {
        upsert_in(self.pool, category).await?;
        self.events.notify(Table::Categories);
        Ok(())
    }

    /// Upsert a batch of categories in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if any write fails; none are applied.
    pub async fn upsert_many(&self, categories: &[Category]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for category in categories {
            upsert_in(&mut *tx, category).await?;
        }
        tx.commit().await?;

        self.events.notify(Table::Categories);
        Ok(())
    }

    /// Delete a category.
    ///
    /// # Returns
    ///
    /// Returns `true` if the category was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if products still reference
    /// the category, `StoreError::Database` for other failures.
    pub async fn delete(&self, id: &CategoryId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool)
            .await
            .map_err(|e| map_write_error(e, "category"))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.events.notify(Table::Categories);
        }
        Ok(deleted)
    }

    /// Number of stored categories.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Live stream of all categories in display order.
    #[must_use]
    pub fn watch(&self) -> BoxStream<'static, Result<Vec<Category>, StoreError>> {
        let pool = self.pool.clone();
        events::live(self.events, &[Table::Categories], move || {
            let pool = pool.clone();
            async move { fetch_all(&pool).await }
        })
    }
}

async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Category>, StoreError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, icon_url, sort_order FROM categories ORDER BY sort_order ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Category::from).collect())
}

async fn upsert_in<'e, E>(executor: E, category: &Category) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO categories (id, name, icon_url, sort_order)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            icon_url = excluded.icon_url,
            sort_order = excluded.sort_order
        ",
    )
    .bind(category.id.as_str())
    .bind(&category.name)
    .bind(&category.icon_url)
    .bind(category.sort_order)
    .execute(executor)
    .await?;

    Ok(())
}
