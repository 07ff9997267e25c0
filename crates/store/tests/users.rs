//! User accounts: lookups, profile editing and cascade deletion.

#![allow(clippy::unwrap_used)]

mod common;

use tekmart_core::{Email, ProductId, UserId};
use tekmart_store::StoreError;
use tekmart_store::models::{CartScope, NewAddress};

use common::{empty_store, register_user, seeded_store};

#[tokio::test]
async fn lookups_work_by_id_and_normalized_email() {
    let store = empty_store().await;
    let (_, user) = register_user(&store, "Finder@X.com").await;
    let users = store.users();

    let by_id = users.get(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email.as_str(), "finder@x.com");

    // lookup goes through the same normalization as registration
    let email = Email::parse("FINDER@x.COM").unwrap();
    let by_email = users.get_by_email(&email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);

    let missing = Email::parse("ghost@x.com").unwrap();
    assert!(users.get_by_email(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn profile_edits_round_trip() {
    let store = empty_store().await;
    let (_, user) = register_user(&store, "profile@x.com").await;
    let users = store.users();

    let updated = users
        .update_profile(&user.id, Some("Анна"), Some("+7 900 000-00-00"))
        .await
        .unwrap();
    assert_eq!(updated.name.as_deref(), Some("Анна"));
    assert_eq!(updated.phone.as_deref(), Some("+7 900 000-00-00"));
    assert!(updated.updated_at >= user.updated_at);

    // fields can be cleared again
    let cleared = users.update_profile(&user.id, None, None).await.unwrap();
    assert_eq!(cleared.name, None);
    assert_eq!(cleared.phone, None);

    let missing = users
        .update_profile(&UserId::new("ghost"), Some("x"), None)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn deleting_a_user_cascades_to_owned_rows() {
    let store = seeded_store().await;
    let (_, user) = register_user(&store, "gone@x.com").await;
    let users = store.users();

    let address = users
        .add_address(
            &user.id,
            NewAddress {
                street: "Тверская 1".to_owned(),
                city: "Москва".to_owned(),
                postal_code: "125009".to_owned(),
                country: "Россия".to_owned(),
            },
            true,
        )
        .await
        .unwrap();

    let scope = CartScope::User(user.id.clone());
    store
        .cart()
        .add(&scope, &ProductId::new("prod_1"), 1)
        .await
        .unwrap();
    let order = store
        .orders()
        .create_from_cart(&user.id, &address.id)
        .await
        .unwrap();

    assert!(users.delete(&user.id).await.unwrap());

    assert!(users.get(&user.id).await.unwrap().is_none());
    assert!(users.address(&address.id).await.unwrap().is_none());
    assert!(store.cart().lines(&scope).await.unwrap().is_empty());
    assert!(store.orders().get(&order.id).await.unwrap().is_none());

    // the catalog is not owned by any user and is untouched
    assert_eq!(store.products().count().await.unwrap(), 11);
}
