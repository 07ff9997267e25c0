//! Cart semantics: merge-on-add, the quantity floor, scoping and derived
//! totals.

#![allow(clippy::unwrap_used)]

mod common;

use tekmart_core::{CartItemId, Price, ProductId};
use tekmart_store::StoreError;
use tekmart_store::db::cart::MAX_LINE_QUANTITY;
use tekmart_store::models::CartScope;

use common::{empty_store, register_user, seeded_store, test_category, test_product};

#[tokio::test]
async fn adding_same_product_twice_merges_into_one_line() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;
    let prod = ProductId::new("prod_1");

    cart.add(&scope, &prod, 2).await.unwrap();
    cart.add(&scope, &prod, 3).await.unwrap();

    let lines = cart.lines(&scope).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product.id, prod);
    assert_eq!(lines[0].quantity, 5);
}

#[tokio::test]
async fn add_is_not_idempotent() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;
    let prod = ProductId::new("prod_2");

    cart.add(&scope, &prod, 1).await.unwrap();
    cart.add(&scope, &prod, 1).await.unwrap();
    cart.add(&scope, &prod, 1).await.unwrap();

    let lines = cart.lines(&scope).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
}

#[tokio::test]
async fn decreasing_from_one_deletes_the_line() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;

    let line = cart.add(&scope, &ProductId::new("prod_1"), 2).await.unwrap();

    let line = cart.decrease_quantity(&line.id).await.unwrap().unwrap();
    assert_eq!(line.quantity, 1);

    let removed = cart.decrease_quantity(&line.id).await.unwrap();
    assert!(removed.is_none());
    assert!(cart.lines(&scope).await.unwrap().is_empty());
    assert!(cart.line(&line.id).await.unwrap().is_none());
}

#[tokio::test]
async fn setting_quantity_to_zero_deletes_the_line() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;

    let line = cart.add(&scope, &ProductId::new("prod_3"), 4).await.unwrap();

    let updated = cart.set_quantity(&line.id, 2).await.unwrap().unwrap();
    assert_eq!(updated.quantity, 2);

    assert!(cart.set_quantity(&line.id, 0).await.unwrap().is_none());
    assert!(cart.lines(&scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn quantities_are_capped() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;
    let prod = ProductId::new("prod_1");

    let line = cart.add(&scope, &prod, 90).await.unwrap();
    assert_eq!(line.quantity, 90);

    let line = cart.add(&scope, &prod, 50).await.unwrap();
    assert_eq!(line.quantity, MAX_LINE_QUANTITY);

    let line = cart.increase_quantity(&line.id).await.unwrap();
    assert_eq!(line.quantity, MAX_LINE_QUANTITY);
}

#[tokio::test]
async fn zero_quantity_add_is_rejected() {
    let store = seeded_store().await;
    let result = store
        .cart()
        .add(&CartScope::Guest, &ProductId::new("prod_1"), 0)
        .await;

    assert!(matches!(result, Err(StoreError::InvalidQuantity)));
    assert!(store.cart().lines(&CartScope::Guest).await.unwrap().is_empty());
}

#[tokio::test]
async fn adding_unknown_product_is_a_constraint_violation() {
    let store = seeded_store().await;
    let result = store
        .cart()
        .add(&CartScope::Guest, &ProductId::new("prod_missing"), 1)
        .await;

    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
}

#[tokio::test]
async fn unknown_line_operations_report_not_found() {
    let store = seeded_store().await;
    let cart = store.cart();
    let missing = CartItemId::new("no-such-line");

    assert!(matches!(
        cart.increase_quantity(&missing).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        cart.decrease_quantity(&missing).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        cart.set_quantity(&missing, 3).await,
        Err(StoreError::NotFound)
    ));
    assert!(!cart.remove(&missing).await.unwrap());
}

#[tokio::test]
async fn totals_are_subtotal_plus_delivery_fee() {
    let store = empty_store().await;
    store
        .categories()
        .upsert(&test_category("cat_t", "Тест", 1))
        .await
        .unwrap();
    store
        .products()
        .upsert(&test_product("prod_a", "A", 100, "cat_t"))
        .await
        .unwrap();
    store
        .products()
        .upsert(&test_product("prod_b", "B", 50, "cat_t"))
        .await
        .unwrap();

    let cart = store.cart();
    let scope = CartScope::Guest;
    cart.add(&scope, &ProductId::new("prod_a"), 2).await.unwrap();
    cart.add(&scope, &ProductId::new("prod_b"), 1).await.unwrap();

    let totals = cart.totals(&scope).await.unwrap();
    assert_eq!(totals.subtotal, Price::from_major(250));
    assert_eq!(totals.delivery_fee, Price::from_major(300));
    assert_eq!(totals.total, Price::from_major(550));
}

#[tokio::test]
async fn totals_track_live_price_changes() {
    let store = empty_store().await;
    store
        .categories()
        .upsert(&test_category("cat_t", "Тест", 1))
        .await
        .unwrap();
    let mut product = test_product("prod_a", "A", 100, "cat_t");
    store.products().upsert(&product).await.unwrap();

    let cart = store.cart();
    let scope = CartScope::Guest;
    cart.add(&scope, &ProductId::new("prod_a"), 2).await.unwrap();

    assert_eq!(
        cart.totals(&scope).await.unwrap().total,
        Price::from_major(500)
    );

    product.price = Price::from_major(10);
    store.products().update(&product).await.unwrap();

    // cart totals are never cached, so the edit shows up immediately
    assert_eq!(
        cart.totals(&scope).await.unwrap().total,
        Price::from_major(320)
    );
}

#[tokio::test]
async fn guest_and_user_carts_are_separate() {
    let store = seeded_store().await;
    let (_, user) = register_user(&store, "cart@example.com").await;

    let cart = store.cart();
    let guest = CartScope::Guest;
    let mine = CartScope::User(user.id.clone());
    let prod = ProductId::new("prod_1");

    cart.add(&guest, &prod, 1).await.unwrap();
    cart.add(&mine, &prod, 2).await.unwrap();

    assert_eq!(cart.lines(&guest).await.unwrap()[0].quantity, 1);
    assert_eq!(cart.lines(&mine).await.unwrap()[0].quantity, 2);

    let removed = cart.clear(&mine).await.unwrap();
    assert_eq!(removed, 1);
    assert!(cart.lines(&mine).await.unwrap().is_empty());
    assert_eq!(cart.lines(&guest).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_product_cascades_to_cart_lines() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;
    let prod = ProductId::new("prod_1");

    cart.add(&scope, &prod, 2).await.unwrap();
    cart.add(&scope, &ProductId::new("prod_2"), 1).await.unwrap();

    assert!(store.products().delete(&prod).await.unwrap());

    let lines = cart.lines(&scope).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product.id, ProductId::new("prod_2"));
}

#[tokio::test]
async fn line_subtotals_use_live_prices() {
    let store = seeded_store().await;
    let cart = store.cart();
    let scope = CartScope::Guest;

    let line = cart.add(&scope, &ProductId::new("prod_8"), 3).await.unwrap();
    assert_eq!(line.subtotal(), Price::from_major(5_970));
}
