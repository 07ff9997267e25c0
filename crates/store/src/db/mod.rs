//! Entity store: pool setup, migrations, error taxonomy and repositories.
//!
//! # Tables
//!
//! - `categories` - Catalog categories, listed by explicit sort order
//! - `products` - Catalog products (specification map stored as JSON)
//! - `users` - Accounts, credentials and the pending security-code challenge
//! - `addresses` - Delivery addresses (cascade-deleted with their user)
//! - `cart_items` - Cart lines; `user_id IS NULL` is the guest cart
//! - `orders` / `order_items` - Placed orders with frozen item snapshots
//! - `settings` - Key-value preferences
//!
//! The schema lives in `crates/store/migrations/` and is applied by
//! [`Store::connect`] (or `tekmart migrate`). Every connection enforces
//! foreign keys, so cascade rules hold for all writers.

pub mod cart;
pub mod categories;
pub mod events;
pub mod orders;
pub mod products;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use tekmart_core::{OrderStatus, Price};

pub use cart::CartRepository;
pub use categories::CategoryRepository;
pub use events::ChangeNotifier;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

use crate::auth::AuthService;
use crate::config::StoreConfig;
use crate::settings::SettingsStore;

/// Embedded migrations from `crates/store/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx (I/O, busy, pool exhaustion).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Unique-key conflict (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Foreign-key violation: a write referenced a missing parent row.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A cart operation was given a zero quantity.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Checkout was attempted with an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// An order status update that is neither forward nor a valid cancel.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
}

/// Map a failed write to the store error taxonomy.
///
/// Unique-index violations become [`StoreError::Conflict`], foreign-key
/// violations become [`StoreError::ConstraintViolation`]; anything else is a
/// plain database error.
pub(crate) fn map_write_error(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::ConstraintViolation(format!(
                "{what} violates a foreign-key constraint"
            ));
        }
    }
    StoreError::Database(e)
}

/// Create a SQLite connection pool with sensible defaults.
///
/// Foreign-key enforcement and WAL journaling are set on every connection;
/// the file is created if missing. In-memory databases get a single
/// connection, since each SQLite `:memory:` connection is its own database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();

    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let max_connections = if url.contains(":memory:") { 1 } else { 10 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Handle to the entity store.
///
/// Owns the connection pool and the change notifier behind the live query
/// streams. Cheap to share by reference; repositories borrow from it.
#[derive(Debug)]
pub struct Store {
    pool: SqlitePool,
    events: ChangeNotifier,
    delivery_fee: Price,
}

impl Store {
    /// Open (creating if necessary) and migrate the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be created and
    /// [`StoreError::Migration`] if pending migrations fail to apply.
    pub async fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        let pool = create_pool(&config.database_url).await?;
        MIGRATOR.run(&pool).await?;
        tracing::debug!("store opened and migrated");

        Ok(Self {
            pool,
            events: ChangeNotifier::new(),
            delivery_fee: config.delivery_fee,
        })
    }

    /// Catalog product repository.
    #[must_use]
    pub const fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(&self.pool, &self.events)
    }

    /// Catalog category repository.
    #[must_use]
    pub const fn categories(&self) -> CategoryRepository<'_> {
        CategoryRepository::new(&self.pool, &self.events)
    }

    /// Cart repository.
    #[must_use]
    pub const fn cart(&self) -> CartRepository<'_> {
        CartRepository::new(&self.pool, &self.events, self.delivery_fee)
    }

    /// Order repository.
    #[must_use]
    pub const fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool, &self.events, self.delivery_fee)
    }

    /// User and address repository.
    #[must_use]
    pub const fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool, &self.events)
    }

    /// Authentication service.
    #[must_use]
    pub const fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    /// Durable settings store.
    #[must_use]
    pub const fn settings(&self) -> SettingsStore<'_> {
        SettingsStore::new(&self.pool, &self.events)
    }
}
