//! Product repository.
//!
//! Rows store the price as canonical decimal TEXT and the specification map
//! as JSON; both are parsed on read and invalid stored values surface as
//! `StoreError::DataCorruption`.

use std::collections::BTreeMap;

use futures::stream::BoxStream;
use sqlx::SqlitePool;

use tekmart_core::{CategoryId, Price, ProductId};

use super::events::{self, ChangeNotifier, Table};
use super::{StoreError, map_write_error};
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    price: String,
    category_id: String,
    image_url: Option<String>,
    specifications: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::parse(&row.price).map_err(|e| {
            StoreError::DataCorruption(format!("invalid price in database: {e}"))
        })?;

        let specifications: BTreeMap<String, String> = serde_json::from_str(&row.specifications)
            .map_err(|e| {
                StoreError::DataCorruption(format!("invalid specifications in database: {e}"))
            })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price,
            category_id: CategoryId::new(row.category_id),
            image_url: row.image_url,
            specifications,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, category_id, image_url, specifications";

/// Repository for catalog products.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
    events: &'a ChangeNotifier,
}

impl<'a> ProductRepository<'a> {
    pub(crate) const fn new(pool: &'a SqlitePool, events: &'a ChangeNotifier) -> Self {
        Self { pool, events }
    }

    /// All products, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn list(&self) -> Result<Vec<Product>, StoreError> {
        fetch_all(self.pool).await
    }

    /// Products in one category, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn by_category(&self, category_id: &CategoryId) -> Result<Vec<Product>, StoreError> {
        fetch_by_category(self.pool, category_id.as_str()).await
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if the stored row is invalid.
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Substring search over product name OR description.
    ///
    /// Matching is case-insensitive for ASCII (SQLite `LIKE` semantics);
    /// `%`, `_` and `\` in the query are matched literally.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn search(&self, query: &str) -> Result<Vec<Product>, StoreError> {
        fetch_search(self.pool, query).await
    }

    /// Insert a product, or replace every field of an existing one with the
    /// same ID. Replacing keeps row identity, so cart lines referencing the
    /// product survive.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if the category doesn't
    /// exist, `StoreError::Database` for other failures.
    pub async fn upsert(&self, product: &Product) -> Result<(), StoreError> {
        upsert_in(self.pool, product).await?;
        self.events.notify(Table::Products);
        Ok(())
    }

    /// Upsert a batch of products in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if a category doesn't
    /// exist, `StoreError::Database` for other failures; on any failure
    /// none are applied.
    pub async fn upsert_many(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for product in products {
            upsert_in(&mut *tx, product).await?;
        }
        tx.commit().await?;

        self.events.notify(Table::Products);
        Ok(())
    }

    /// Update an existing product in full.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no product has this ID,
    /// `StoreError::ConstraintViolation` if the category doesn't exist,
    /// `StoreError::Database` for other failures.
    pub async fn update(&self, product: &Product) -> Result<(), StoreError> {
        let specifications = serde_json::to_string(&product.specifications).map_err(|e| {
            StoreError::DataCorruption(format!("failed to serialize specifications: {e}"))
        })?;

        let result = sqlx::query(
            r"
            UPDATE products
            SET name = ?, description = ?, price = ?, category_id = ?,
                image_url = ?, specifications = ?
            WHERE id = ?
            ",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(product.category_id.as_str())
        .bind(&product.image_url)
        .bind(specifications)
        .bind(product.id.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| map_write_error(e, "product"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.events.notify(Table::Products);
        Ok(())
    }

    /// Delete a product. Cart lines referencing it are cascade-deleted;
    /// order item snapshots are untouched.
    ///
    /// # Returns
    ///
    /// Returns `true` if the product was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn delete(&self, id: &ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.events.notify(Table::Products);
            // the FK cascade may have taken cart lines with it
            self.events.notify(Table::CartItems);
        }
        Ok(deleted)
    }

    /// Number of stored products.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Live stream of all products.
    #[must_use]
    pub fn watch_all(&self) -> BoxStream<'static, Result<Vec<Product>, StoreError>> {
        let pool = self.pool.clone();
        events::live(self.events, &[Table::Products], move || {
            let pool = pool.clone();
            async move { fetch_all(&pool).await }
        })
    }

    /// Live stream of the products in one category.
    #[must_use]
    pub fn watch_by_category(
        &self,
        category_id: &CategoryId,
    ) -> BoxStream<'static, Result<Vec<Product>, StoreError>> {
        let pool = self.pool.clone();
        let category_id = category_id.as_str().to_owned();
        events::live(self.events, &[Table::Products], move || {
            let pool = pool.clone();
            let category_id = category_id.clone();
            async move { fetch_by_category(&pool, &category_id).await }
        })
    }

    /// Live stream of search results for a fixed query.
    #[must_use]
    pub fn watch_search(&self, query: &str) -> BoxStream<'static, Result<Vec<Product>, StoreError>> {
        let pool = self.pool.clone();
        let query = query.to_owned();
        events::live(self.events, &[Table::Products], move || {
            let pool = pool.clone();
            let query = query.clone();
            async move { fetch_search(&pool, &query).await }
        })
    }
}

async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Product>, StoreError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Product::try_from).collect()
}

async fn fetch_by_category(pool: &SqlitePool, category_id: &str) -> Result<Vec<Product>, StoreError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = ? ORDER BY name ASC"
    ))
    .bind(category_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Product::try_from).collect()
}

async fn fetch_search(pool: &SqlitePool, query: &str) -> Result<Vec<Product>, StoreError> {
    let pattern = like_pattern(query);

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        r"
        SELECT {PRODUCT_COLUMNS} FROM products
        WHERE name LIKE ? ESCAPE '\' OR description LIKE ? ESCAPE '\'
        ORDER BY name ASC
        "
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Product::try_from).collect()
}

/// Wrap a user query in `%...%`, escaping LIKE metacharacters so they match
/// literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', r"\\")
        .replace('%', r"\%")
        .replace('_', r"\_");
    format!("%{escaped}%")
}

async fn upsert_in<'e, E>(executor: E, product: &Product) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let specifications = serde_json::to_string(&product.specifications).map_err(|e| {
        StoreError::DataCorruption(format!("failed to serialize specifications: {e}"))
    })?;

    sqlx::query(
        r"
        INSERT INTO products (id, name, description, price, category_id, image_url, specifications)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            price = excluded.price,
            category_id = excluded.category_id,
            image_url = excluded.image_url,
            specifications = excluded.specifications
        ",
    )
    .bind(product.id.as_str())
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.to_string())
    .bind(product.category_id.as_str())
    .bind(&product.image_url)
    .bind(specifications)
    .execute(executor)
    .await
    .map_err(|e| map_write_error(e, "product"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%"), r"%50\%%");
        assert_eq!(like_pattern("a_b"), r"%a\_b%");
        assert_eq!(like_pattern(r"c:\x"), r"%c:\\x%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
