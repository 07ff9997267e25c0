//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tekmart_core::{AddressId, OrderId, OrderStatus, Price, ProductId, UserId};

/// A placed order with its item snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// The user who placed the order.
    pub user_id: UserId,
    /// Item snapshots, fixed at checkout.
    pub items: Vec<OrderItem>,
    /// Grand total computed at checkout (`Σ quantity × unit_price` plus the
    /// delivery fee). Never recomputed afterwards.
    pub total_price: Price,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// ID of the delivery address at checkout time. A plain snapshot
    /// reference: deleting the address does not touch the order.
    pub delivery_address_id: AddressId,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order last changed status.
    pub updated_at: DateTime<Utc>,
}

/// A product snapshot inside an order.
///
/// Name and unit price are copied from the product at purchase time and are
/// decoupled from later catalog edits; `product_id` is kept for reference
/// but is not a live link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product this line was created from.
    pub product_id: ProductId,
    /// Product name at purchase time.
    pub product_name: String,
    /// Unit price at purchase time.
    pub unit_price: Price,
    /// Units purchased.
    pub quantity: u32,
}

impl OrderItem {
    /// `quantity × unit_price` at purchase time.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}
