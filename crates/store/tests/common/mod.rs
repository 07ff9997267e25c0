//! Shared fixtures for store integration tests.
//!
//! Every test runs against its own in-memory store, so tests are fully
//! isolated and need no external services.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use tekmart_core::{CategoryId, Email, Price, ProductId};
use tekmart_store::auth::{AuthSession, CodeDeliveryError, SecurityCodeSender};
use tekmart_store::config::StoreConfig;
use tekmart_store::models::{Category, Product, User};
use tekmart_store::{Store, seed};

/// A fresh, migrated, empty in-memory store.
pub async fn empty_store() -> Store {
    Store::connect(StoreConfig::in_memory())
        .await
        .expect("failed to open in-memory store")
}

/// A store with the demo catalog seeded.
pub async fn seeded_store() -> Store {
    let store = empty_store().await;
    seed::seed_catalog(&store).await.expect("failed to seed");
    store
}

/// Build a catalog category fixture.
pub fn test_category(id: &str, name: &str, sort_order: i32) -> Category {
    Category {
        id: CategoryId::new(id),
        name: name.to_owned(),
        icon_url: None,
        sort_order,
    }
}

/// Build a product fixture priced in whole units.
pub fn test_product(id: &str, name: &str, price: u64, category: &str) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        description: format!("{name} description"),
        price: Price::from_major(price),
        category_id: CategoryId::new(category),
        image_url: None,
        specifications: BTreeMap::new(),
    }
}

/// Register a user and return their session.
pub async fn register_user(store: &Store, email: &str) -> (AuthSession, User) {
    let mut session = AuthSession::new();
    let user = store
        .auth()
        .register(&mut session, email, "pw123456")
        .await
        .expect("registration failed");
    (session, user)
}

/// A code "delivery channel" that just records what it was asked to send.
#[derive(Default)]
pub struct RecordingSender {
    codes: Mutex<Vec<String>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently delivered code.
    pub fn last_code(&self) -> Option<String> {
        self.codes.lock().unwrap().last().cloned()
    }

    /// How many codes were delivered.
    pub fn deliveries(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

#[async_trait]
impl SecurityCodeSender for RecordingSender {
    async fn deliver(&self, _email: &Email, code: &str) -> Result<(), CodeDeliveryError> {
        self.codes.lock().unwrap().push(code.to_owned());
        Ok(())
    }
}

/// A delivery channel that always fails.
pub struct FailingSender;

#[async_trait]
impl SecurityCodeSender for FailingSender {
    async fn deliver(&self, _email: &Email, _code: &str) -> Result<(), CodeDeliveryError> {
        Err(CodeDeliveryError("sms gateway unreachable".to_owned()))
    }
}
