//! Cart repository.
//!
//! A cart is the set of `cart_items` rows in one scope (guest or user).
//! Lines join their live product at read time, so prices shown in the cart
//! always track catalog edits; totals are derived on every read and never
//! persisted. Mutations of a line run in a transaction, so concurrent
//! increments of the same line cannot lose updates.

use std::collections::BTreeMap;

use futures::stream::BoxStream;
use sqlx::SqlitePool;

use tekmart_core::{CartItemId, CategoryId, Price, ProductId};

use super::events::{self, ChangeNotifier, Table};
use super::{StoreError, map_write_error};
use crate::models::{CartLine, CartScope, CartTotals, Product};

/// Most units of one product a single cart line may hold. Merging or
/// incrementing past the cap keeps the line at the cap.
pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: String,
    quantity: i64,
    product_id: String,
    name: String,
    description: String,
    price: String,
    category_id: String,
    image_url: Option<String>,
    specifications: String,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = StoreError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let price = Price::parse(&row.price).map_err(|e| {
            StoreError::DataCorruption(format!("invalid price in database: {e}"))
        })?;

        let specifications: BTreeMap<String, String> = serde_json::from_str(&row.specifications)
            .map_err(|e| {
                StoreError::DataCorruption(format!("invalid specifications in database: {e}"))
            })?;

        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::DataCorruption(format!("invalid cart quantity: {}", row.quantity))
        })?;

        Ok(Self {
            id: CartItemId::new(row.id),
            product: Product {
                id: ProductId::new(row.product_id),
                name: row.name,
                description: row.description,
                price,
                category_id: CategoryId::new(row.category_id),
                image_url: row.image_url,
                specifications,
            },
            quantity,
        })
    }
}

const LINE_SELECT: &str = r"
    SELECT c.id AS id, c.quantity AS quantity,
           p.id AS product_id, p.name AS name, p.description AS description,
           p.price AS price, p.category_id AS category_id,
           p.image_url AS image_url, p.specifications AS specifications
    FROM cart_items c
    JOIN products p ON p.id = c.product_id
";

/// Repository for cart lines and derived totals.
pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
    events: &'a ChangeNotifier,
    delivery_fee: Price,
}

impl<'a> CartRepository<'a> {
    pub(crate) const fn new(
        pool: &'a SqlitePool,
        events: &'a ChangeNotifier,
        delivery_fee: Price,
    ) -> Self {
        Self {
            pool,
            events,
            delivery_fee,
        }
    }

    /// All lines in a cart, with live product data, ordered by product name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn lines(&self, scope: &CartScope) -> Result<Vec<CartLine>, StoreError> {
        fetch_lines(self.pool, scope.as_db()).await
    }

    /// Get one cart line by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if the stored row is invalid.
    pub async fn line(&self, id: &CartItemId) -> Result<Option<CartLine>, StoreError> {
        fetch_line(self.pool, id.as_str()).await
    }

    /// Add `quantity` more units of a product to a cart.
    ///
    /// If the cart already holds the product, the existing line is
    /// incremented (one line per product per scope); otherwise a new line
    /// with a fresh ID is created. Deliberately not idempotent: every call
    /// adds more. Quantities are capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidQuantity` if `quantity` is zero,
    /// `StoreError::ConstraintViolation` if the product doesn't exist, and
    /// `StoreError::Database` for other failures.
    pub async fn add(
        &self,
        scope: &CartScope,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartLine, StoreError> {
        if quantity == 0 {
            return Err(StoreError::InvalidQuantity);
        }

        let mut tx = self.pool.begin().await?;

        let existing: Option<(String, i64)> = sqlx::query_as(
            "SELECT id, quantity FROM cart_items WHERE product_id = ? AND user_id IS ?",
        )
        .bind(product_id.as_str())
        .bind(scope.as_db())
        .fetch_optional(&mut *tx)
        .await?;

        let line_id = if let Some((id, current)) = existing {
            let current = u32::try_from(current).map_err(|_| {
                StoreError::DataCorruption(format!("invalid cart quantity: {current}"))
            })?;
            let merged = current.saturating_add(quantity).min(MAX_LINE_QUANTITY);

            sqlx::query("UPDATE cart_items SET quantity = ? WHERE id = ?")
                .bind(i64::from(merged))
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            id
        } else {
            let id = CartItemId::generate();
            sqlx::query(
                "INSERT INTO cart_items (id, product_id, user_id, quantity) VALUES (?, ?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(product_id.as_str())
            .bind(scope.as_db())
            .bind(i64::from(quantity.min(MAX_LINE_QUANTITY)))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "cart item"))?;
            id.into_inner()
        };

        let line = fetch_line_in(&mut tx, &line_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        self.events.notify(Table::CartItems);
        Ok(line)
    }

    /// Set a line's quantity outright.
    ///
    /// A quantity of zero deletes the line (quantities below 1 are never
    /// stored); otherwise the quantity is capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Returns
    ///
    /// The updated line, or `None` if the line was deleted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no line has this ID and
    /// `StoreError::Database` for other failures.
    pub async fn set_quantity(
        &self,
        id: &CartItemId,
        quantity: u32,
    ) -> Result<Option<CartLine>, StoreError> {
        if quantity == 0 {
            let result = sqlx::query("DELETE FROM cart_items WHERE id = ?")
                .bind(id.as_str())
                .execute(self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            self.events.notify(Table::CartItems);
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE cart_items SET quantity = ? WHERE id = ?")
            .bind(i64::from(quantity.min(MAX_LINE_QUANTITY)))
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let line = fetch_line_in(&mut tx, id.as_str())
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        self.events.notify(Table::CartItems);
        Ok(Some(line))
    }

    /// Add one unit to a line, capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no line has this ID and
    /// `StoreError::Database` for other failures.
    pub async fn increase_quantity(&self, id: &CartItemId) -> Result<CartLine, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE cart_items SET quantity = MIN(quantity + 1, ?) WHERE id = ?")
            .bind(i64::from(MAX_LINE_QUANTITY))
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let line = fetch_line_in(&mut tx, id.as_str())
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        self.events.notify(Table::CartItems);
        Ok(line)
    }

    /// Remove one unit from a line. Dropping below one unit deletes the
    /// line entirely.
    ///
    /// # Returns
    ///
    /// The updated line, or `None` if the line was deleted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no line has this ID and
    /// `StoreError::Database` for other failures.
    pub async fn decrease_quantity(&self, id: &CartItemId) -> Result<Option<CartLine>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Err(StoreError::NotFound);
        };

        if current <= 1 {
            sqlx::query("DELETE FROM cart_items WHERE id = ?")
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            self.events.notify(Table::CartItems);
            return Ok(None);
        }

        sqlx::query("UPDATE cart_items SET quantity = quantity - 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        let line = fetch_line_in(&mut tx, id.as_str())
            .await?
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        self.events.notify(Table::CartItems);
        Ok(Some(line))
    }

    /// Remove a line outright.
    ///
    /// # Returns
    ///
    /// Returns `true` if the line was removed, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn remove(&self, id: &CartItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.events.notify(Table::CartItems);
        }
        Ok(removed)
    }

    /// Empty a cart.
    ///
    /// # Returns
    ///
    /// The number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn clear(&self, scope: &CartScope) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id IS ?")
            .bind(scope.as_db())
            .execute(self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            self.events.notify(Table::CartItems);
        }
        Ok(removed)
    }

    /// Number of lines in a cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self, scope: &CartScope) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id IS ?")
            .bind(scope.as_db())
            .fetch_one(self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Derived totals for a cart, recomputed from live product prices.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn totals(&self, scope: &CartScope) -> Result<CartTotals, StoreError> {
        let lines = self.lines(scope).await?;
        Ok(CartTotals::compute(&lines, self.delivery_fee))
    }

    /// Live stream of a cart's lines. Re-emits on cart mutations and on
    /// catalog edits of the joined products.
    #[must_use]
    pub fn watch(&self, scope: &CartScope) -> BoxStream<'static, Result<Vec<CartLine>, StoreError>> {
        let pool = self.pool.clone();
        let scope = scope.as_db().map(ToOwned::to_owned);
        events::live(self.events, &[Table::CartItems, Table::Products], move || {
            let pool = pool.clone();
            let scope = scope.clone();
            async move { fetch_lines(&pool, scope.as_deref()).await }
        })
    }

    /// Live stream of a cart's derived totals.
    #[must_use]
    pub fn watch_totals(
        &self,
        scope: &CartScope,
    ) -> BoxStream<'static, Result<CartTotals, StoreError>> {
        let pool = self.pool.clone();
        let scope = scope.as_db().map(ToOwned::to_owned);
        let delivery_fee = self.delivery_fee;
        events::live(self.events, &[Table::CartItems, Table::Products], move || {
            let pool = pool.clone();
            let scope = scope.clone();
            async move {
                let lines = fetch_lines(&pool, scope.as_deref()).await?;
                Ok(CartTotals::compute(&lines, delivery_fee))
            }
        })
    }
}

async fn fetch_lines(pool: &SqlitePool, scope: Option<&str>) -> Result<Vec<CartLine>, StoreError> {
    let rows = sqlx::query_as::<_, CartLineRow>(&format!(
        "{LINE_SELECT} WHERE c.user_id IS ? ORDER BY p.name ASC"
    ))
    .bind(scope)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CartLine::try_from).collect()
}

async fn fetch_line(pool: &SqlitePool, id: &str) -> Result<Option<CartLine>, StoreError> {
    let row = sqlx::query_as::<_, CartLineRow>(&format!("{LINE_SELECT} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(CartLine::try_from).transpose()
}

async fn fetch_line_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
) -> Result<Option<CartLine>, StoreError> {
    let row = sqlx::query_as::<_, CartLineRow>(&format!("{LINE_SELECT} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    row.map(CartLine::try_from).transpose()
}

pub(crate) async fn fetch_lines_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    scope: Option<&str>,
) -> Result<Vec<CartLine>, StoreError> {
    let rows = sqlx::query_as::<_, CartLineRow>(&format!(
        "{LINE_SELECT} WHERE c.user_id IS ? ORDER BY p.name ASC"
    ))
    .bind(scope)
    .fetch_all(&mut **tx)
    .await?;

    rows.into_iter().map(CartLine::try_from).collect()
}
