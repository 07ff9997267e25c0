//! Order repository.
//!
//! Orders are created from the current cart snapshot in a single
//! transaction: the order row, every item snapshot and the cart clear
//! either all commit or none do, so a crash can never leave an order
//! without its items. Item snapshots copy name and unit price at checkout;
//! later catalog edits do not touch placed orders.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sqlx::SqlitePool;

use tekmart_core::{AddressId, OrderId, OrderStatus, Price, ProductId, UserId};

use super::cart::fetch_lines_in;
use super::events::{self, ChangeNotifier, Table};
use super::StoreError;
use crate::models::{CartTotals, Order, OrderItem};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    total_price: String,
    status: String,
    delivery_address_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let total_price = Price::parse(&self.total_price).map_err(|e| {
            StoreError::DataCorruption(format!("invalid order total in database: {e}"))
        })?;
        let status = self.status.parse::<OrderStatus>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            items,
            total_price,
            status,
            delivery_address_id: AddressId::new(self.delivery_address_id),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    product_name: String,
    unit_price: String,
    quantity: i64,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let unit_price = Price::parse(&row.unit_price).map_err(|e| {
            StoreError::DataCorruption(format!("invalid order item price in database: {e}"))
        })?;
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::DataCorruption(format!("invalid order item quantity: {}", row.quantity))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price,
            quantity,
        })
    }
}

/// Repository for placed orders.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
    events: &'a ChangeNotifier,
    delivery_fee: Price,
}

impl<'a> OrderRepository<'a> {
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

    /// Place an order from the user's current cart.
    ///
    /// Runs in one transaction: inserts the order row with its total
    /// computed from live prices plus the delivery fee, inserts one item
    /// snapshot per cart line, then clears the user's cart. The total and
    /// the snapshots are frozen from this point on.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the delivery address doesn't exist
    /// or belongs to another user, `StoreError::EmptyCart` if the user's
    /// cart has no lines, and `StoreError::Database` for other failures.
    pub async fn create_from_cart(
        &self,
        user_id: &UserId,
        delivery_address_id: &AddressId,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let address_owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM addresses WHERE id = ? AND user_id = ?")
                .bind(delivery_address_id.as_str())
                .bind(user_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if address_owned.is_none() {
            return Err(StoreError::NotFound);
        }

        let lines = fetch_lines_in(&mut tx, Some(user_id.as_str())).await?;
        if lines.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let totals = CartTotals::compute(&lines, self.delivery_fee);
        let now = Utc::now();
        let order_id = OrderId::generate();

        sqlx::query(
            r"
            INSERT INTO orders (id, user_id, total_price, status, delivery_address_id,
                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(order_id.as_str())
        .bind(user_id.as_str())
        .bind(totals.total.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(delivery_address_id.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            sqlx::query(
                r"
                INSERT INTO order_items (id, order_id, product_id, product_name,
                                         unit_price, quantity)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(order_id.as_str())
            .bind(line.product.id.as_str())
            .bind(&line.product.name)
            .bind(line.product.price.to_string())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;

            items.push(OrderItem {
                product_id: line.product.id.clone(),
                product_name: line.product.name.clone(),
                unit_price: line.product.price,
                quantity: line.quantity,
            });
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id IS ?")
            .bind(Some(user_id.as_str()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.events.notify(Table::Orders);
        self.events.notify(Table::CartItems);
        tracing::info!(order_id = %order_id, user_id = %user_id, total = %totals.total, "order placed");

        Ok(Order {
            id: order_id,
            user_id: user_id.clone(),
            items,
            total_price: totals.total,
            status: OrderStatus::Pending,
            delivery_address_id: delivery_address_id.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an order with its item snapshots.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        fetch_order(self.pool, id.as_str()).await
    }

    /// A user's orders, newest first, with their item snapshots.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if a stored row is invalid.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        fetch_for_user(self.pool, user_id.as_str()).await
    }

    /// Move an order to a new status.
    ///
    /// Statuses only move forward; the one exception is cancelling a
    /// non-terminal order. The order's `updated_at` is touched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no order has this ID,
    /// `StoreError::InvalidStatusTransition` if the move is not allowed,
    /// and `StoreError::Database` for other failures.
    pub async fn update_status(&self, id: &OrderId, next: OrderStatus) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Err(StoreError::NotFound);
        };
        let current = current.parse::<OrderStatus>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }

        sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(next.as_str())
            .bind(Utc::now())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.events.notify(Table::Orders);
        tracing::info!(order_id = %id, from = %current, to = %next, "order status updated");
        Ok(())
    }

    /// Cancel a non-terminal order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no order has this ID,
    /// `StoreError::InvalidStatusTransition` if the order is already
    /// delivered or cancelled, and `StoreError::Database` for other failures.
    pub async fn cancel(&self, id: &OrderId) -> Result<(), StoreError> {
        self.update_status(id, OrderStatus::Cancelled).await
    }

    /// Live stream of a user's orders, newest first.
    #[must_use]
    pub fn watch_for_user(
        &self,
        user_id: &UserId,
    ) -> BoxStream<'static, Result<Vec<Order>, StoreError>> {
        let pool = self.pool.clone();
        let user_id = user_id.as_str().to_owned();
        events::live(self.events, &[Table::Orders], move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            async move { fetch_for_user(&pool, &user_id).await }
        })
    }
}

async fn fetch_order(pool: &SqlitePool, id: &str) -> Result<Option<Order>, StoreError> {
    let row = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, user_id, total_price, status, delivery_address_id, created_at, updated_at
        FROM orders WHERE id = ?
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT order_id, product_id, product_name, unit_price, quantity
        FROM order_items WHERE order_id = ?
        ORDER BY product_name ASC
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let items = item_rows
        .into_iter()
        .map(OrderItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Some(row.into_order(items)).transpose()
}

async fn fetch_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Order>, StoreError> {
    let rows = sqlx::query_as::<_, OrderRow>(
        r"
        SELECT id, user_id, total_price, status, delivery_address_id, created_at, updated_at
        FROM orders WHERE user_id = ?
        ORDER BY created_at DESC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT oi.order_id AS order_id, oi.product_id AS product_id,
               oi.product_name AS product_name, oi.unit_price AS unit_price,
               oi.quantity AS quantity
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.user_id = ?
        ORDER BY oi.product_name ASC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut items_by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let order_id = row.order_id.clone();
        items_by_order
            .entry(order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| {
            let items = items_by_order.remove(&row.id).unwrap_or_default();
            row.into_order(items)
        })
        .collect()
}
