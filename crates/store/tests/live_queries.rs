//! Live query streams: initial snapshot, re-emission on writes, join
//! dependencies and teardown.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use futures::StreamExt;

use tekmart_core::{Price, ProductId, ThemeMode};
use tekmart_store::models::CartScope;

use common::{seeded_store, test_product};

/// Pull the next emission, failing the test instead of hanging.
async fn next_emission<T>(
    stream: &mut futures::stream::BoxStream<'static, Result<T, tekmart_store::StoreError>>,
) -> T {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream did not emit in time")
        .expect("stream ended unexpectedly")
        .expect("live query failed")
}

#[tokio::test]
async fn cart_stream_emits_snapshot_then_updates() {
    let store = seeded_store().await;
    let scope = CartScope::Guest;
    let mut stream = store.cart().watch(&scope);

    let initial = next_emission(&mut stream).await;
    assert!(initial.is_empty());

    store
        .cart()
        .add(&scope, &ProductId::new("prod_1"), 2)
        .await
        .unwrap();

    let after_add = next_emission(&mut stream).await;
    assert_eq!(after_add.len(), 1);
    assert_eq!(after_add[0].quantity, 2);
}

#[tokio::test]
async fn cart_stream_re_emits_on_product_edits() {
    let store = seeded_store().await;
    let scope = CartScope::Guest;

    store
        .cart()
        .add(&scope, &ProductId::new("prod_1"), 1)
        .await
        .unwrap();

    let mut stream = store.cart().watch(&scope);
    let initial = next_emission(&mut stream).await;
    let old_price = initial[0].product.price;

    // an edit to a joined product refreshes the cart projection
    let mut edited = store
        .products()
        .get(&ProductId::new("prod_1"))
        .await
        .unwrap()
        .unwrap();
    edited.price = Price::from_major(1);
    store.products().update(&edited).await.unwrap();

    let refreshed = next_emission(&mut stream).await;
    assert_ne!(refreshed[0].product.price, old_price);
    assert_eq!(refreshed[0].product.price, Price::from_major(1));
}

#[tokio::test]
async fn totals_stream_tracks_cart_mutations() {
    let store = seeded_store().await;
    let scope = CartScope::Guest;
    let mut stream = store.cart().watch_totals(&scope);

    let initial = next_emission(&mut stream).await;
    assert_eq!(initial.subtotal, Price::ZERO);
    assert_eq!(initial.total, Price::from_major(300));

    let line = store
        .cart()
        .add(&scope, &ProductId::new("prod_8"), 2)
        .await
        .unwrap();

    let after_add = next_emission(&mut stream).await;
    assert_eq!(after_add.subtotal, Price::from_major(3_980));

    store.cart().remove(&line.id).await.unwrap();
    let after_remove = next_emission(&mut stream).await;
    assert_eq!(after_remove.subtotal, Price::ZERO);
}

#[tokio::test]
async fn unrelated_writes_do_not_wake_a_stream() {
    let store = seeded_store().await;
    let mut categories = store.categories().watch();

    let initial = next_emission(&mut categories).await;
    assert_eq!(initial.len(), 5);

    // cart writes are not in the category stream's dependency set
    store
        .cart()
        .add(&CartScope::Guest, &ProductId::new("prod_1"), 1)
        .await
        .unwrap();

    let no_wake = tokio::time::timeout(Duration::from_millis(200), categories.next()).await;
    assert!(no_wake.is_err(), "category stream woke on a cart write");
}

#[tokio::test]
async fn product_streams_follow_catalog_writes() {
    let store = seeded_store().await;
    let mut stream = store.products().watch_all();

    let initial = next_emission(&mut stream).await;
    assert_eq!(initial.len(), 11);

    store
        .products()
        .upsert(&test_product("prod_new", "Новинка", 5_000, "cat_4"))
        .await
        .unwrap();

    let after_insert = next_emission(&mut stream).await;
    assert_eq!(after_insert.len(), 12);
}

#[tokio::test]
async fn settings_stream_emits_on_writes() {
    let store = seeded_store().await;
    let mut stream = store.settings().watch();

    let initial = next_emission(&mut stream).await;
    assert_eq!(initial.theme_mode, ThemeMode::System);

    store.settings().set_theme_mode(ThemeMode::Dark).await.unwrap();

    let updated = next_emission(&mut stream).await;
    assert_eq!(updated.theme_mode, ThemeMode::Dark);
}

#[tokio::test]
async fn streams_end_when_the_store_is_dropped() {
    let store = seeded_store().await;
    let mut stream = store.categories().watch();

    let _initial = next_emission(&mut stream).await;

    drop(store);

    let ended = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream did not end in time");
    assert!(ended.is_none());
}

#[tokio::test]
async fn multiple_subscribers_see_the_same_write() {
    let store = seeded_store().await;
    let scope = CartScope::Guest;

    let mut first = store.cart().watch(&scope);
    let mut second = store.cart().watch(&scope);
    assert!(next_emission(&mut first).await.is_empty());
    assert!(next_emission(&mut second).await.is_empty());

    store
        .cart()
        .add(&scope, &ProductId::new("prod_1"), 3)
        .await
        .unwrap();

    assert_eq!(next_emission(&mut first).await[0].quantity, 3);
    assert_eq!(next_emission(&mut second).await[0].quantity, 3);
}
