//! Tekmart Store - embedded commerce data engine.
//!
//! This crate is the local persistence layer of the shop: a SQLite-backed
//! entity store with a repository API on top, cart/order aggregation, the
//! two-factor login flow, and a durable settings store. It is a library
//! consumed by an interactive front end; there is no network surface here.
//!
//! # Modules
//!
//! - [`db`] - Entity store: pool setup, migrations, repositories, live queries
//! - [`models`] - Domain objects returned by the repositories
//! - [`auth`] - Authentication service and security-code state machine
//! - [`settings`] - Durable key-value preferences with defaults
//! - [`seed`] - Demo catalog seeding
//! - [`config`] - Environment configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use tekmart_store::{Store, config::StoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::connect(StoreConfig::in_memory()).await?;
//! tekmart_store::seed::seed_catalog(&store).await?;
//!
//! let products = store.products().list().await?;
//! store.cart().add(&tekmart_store::models::CartScope::Guest, &products[0].id, 2).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod seed;
pub mod settings;

pub use db::{Store, StoreError};
