//! Cart domain types.

use serde::{Deserialize, Serialize};

use tekmart_core::{CartItemId, Price, UserId};

use super::Product;

/// Whose cart an operation targets.
///
/// The guest cart is the single anonymous cart of the device; user carts are
/// keyed by `UserId`. Stored as a nullable `user_id` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartScope {
    /// The anonymous cart (no signed-in user).
    Guest,
    /// The cart of a signed-in user.
    User(UserId),
}

impl CartScope {
    /// The scope's user ID, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }

    /// Nullable database representation.
    pub(crate) fn as_db(&self) -> Option<&str> {
        self.user_id().map(UserId::as_str)
    }
}

impl From<UserId> for CartScope {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

/// One cart line: a distinct product within a cart, with its live product
/// data joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Unique line ID.
    pub id: CartItemId,
    /// The referenced product, joined at read time.
    pub product: Product,
    /// Units of the product in the cart. Always at least 1; a line whose
    /// quantity would drop below 1 is deleted instead.
    pub quantity: u32,
}

impl CartLine {
    /// `quantity × product.price`, recomputed from live data.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Derived cart totals. Never persisted; recomputed on every read so price
/// edits show up immediately for items still in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Σ over lines of `quantity × price`.
    pub subtotal: Price,
    /// Flat configured delivery fee.
    pub delivery_fee: Price,
    /// `subtotal + delivery_fee`.
    pub total: Price,
}

impl CartTotals {
    /// Compute totals for a set of cart lines.
    #[must_use]
    pub fn compute(lines: &[CartLine], delivery_fee: Price) -> Self {
        let subtotal: Price = lines.iter().map(CartLine::subtotal).sum();
        Self {
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
        }
    }
}
