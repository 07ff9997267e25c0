//! Catalog domain types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tekmart_core::{CategoryId, Price, ProductId};

/// A product category, displayed in explicit `sort_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique category ID.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Optional icon image URL.
    pub icon_url: Option<String>,
    /// Position in category listings (ascending).
    pub sort_order: i32,
}

/// A catalog product.
///
/// Live catalog data: the price here is the current price. Orders copy it
/// into an [`OrderItem`](super::OrderItem) snapshot at checkout and are not
/// affected by later edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// Current price.
    pub price: Price,
    /// Category this product belongs to.
    pub category_id: CategoryId,
    /// Optional product image URL.
    pub image_url: Option<String>,
    /// Free-form specification sheet (e.g. "Экран" → "6.2\"").
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}
