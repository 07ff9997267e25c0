//! User and address repository.
//!
//! Credential material (password hash, pending security-code challenge)
//! never leaves this module as part of a domain object; the auth service
//! reaches it through dedicated crate-private methods.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sqlx::SqlitePool;

use tekmart_core::{AddressId, Email, Role, UserId};

use super::events::{self, ChangeNotifier, Table};
use super::{StoreError, map_write_error};
use crate::models::{Address, NewAddress, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    role: String,
    name: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            StoreError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = row.role.parse::<Role>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid role in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            phone: row.phone,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: String,
    user_id: String,
    street: String,
    city: String,
    postal_code: String,
    country: String,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            street: row.street,
            city: row.city,
            postal_code: row.postal_code,
            country: row.country,
            is_default: row.is_default,
        }
    }
}

/// A pending security-code challenge on a user row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SecurityChallenge {
    pub(crate) hash: String,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) attempts: i64,
}

const USER_COLUMNS: &str = "id, email, role, name, phone, created_at, updated_at";
const ADDRESS_COLUMNS: &str = "id, user_id, street, city, postal_code, country, is_default";

/// Repository for user accounts and their address books.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
    events: &'a ChangeNotifier,
}

impl<'a> UserRepository<'a> {
    pub(crate) const fn new(pool: &'a SqlitePool, events: &'a ChangeNotifier) -> Self {
        Self { pool, events }
    }

    /// Create a new user with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is already registered and
    /// `StoreError::Database` for other failures.
    pub(crate) async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let id = UserId::generate();
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO users (id, email, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(id.as_str())
        .bind(email.as_str())
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| map_write_error(e, "user"))?;

        self.events.notify(Table::Users);

        Ok(User {
            id,
            email: email.clone(),
            name: None,
            phone: None,
            role,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if the stored row is invalid.
    pub async fn get(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their (normalized) email address.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash.
    ///
    /// Returns `None` if no user has this email.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails and
    /// `StoreError::DataCorruption` if the stored row is invalid.
    pub(crate) async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct UserAuthRow {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, UserAuthRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some((User::try_from(row.user)?, row.password_hash)))
    }

    /// Update a user's display name and phone.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no user has this ID and
    /// `StoreError::Database` for other failures.
    pub async fn update_profile(
        &self,
        id: &UserId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<User, StoreError> {
        let result = sqlx::query("UPDATE users SET name = ?, phone = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(phone)
            .bind(Utc::now())
            .bind(id.as_str())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.events.notify(Table::Users);
        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    /// Delete a user account. Addresses, cart lines and orders are
    /// cascade-deleted with it.
    ///
    /// # Returns
    ///
    /// Returns `true` if the user was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn delete(&self, id: &UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.events.notify(Table::Users);
            self.events.notify(Table::Addresses);
            self.events.notify(Table::CartItems);
            self.events.notify(Table::Orders);
        }
        Ok(deleted)
    }

    // =========================================================================
    // Security-code challenge (crate-private, used by the auth service)
    // =========================================================================

    /// Store a fresh challenge, replacing any pending one and resetting the
    /// attempt counter.
    pub(crate) async fn set_security_code(
        &self,
        user_id: &UserId,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET security_code_hash = ?, security_code_expires_at = ?,
                security_code_attempts = 0
            WHERE id = ?
            ",
        )
        .bind(code_hash)
        .bind(expires_at)
        .bind(user_id.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// The user's pending challenge, if any.
    pub(crate) async fn security_challenge(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SecurityChallenge>, StoreError> {
        let row = sqlx::query_as::<_, SecurityChallenge>(
            r"
            SELECT security_code_hash AS hash,
                   security_code_expires_at AS expires_at,
                   security_code_attempts AS attempts
            FROM users
            WHERE id = ? AND security_code_hash IS NOT NULL
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Count one failed verification; returns the new attempt total.
    pub(crate) async fn record_code_attempt(&self, user_id: &UserId) -> Result<i64, StoreError> {
        let attempts: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE users SET security_code_attempts = security_code_attempts + 1
            WHERE id = ?
            RETURNING security_code_attempts
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        attempts.ok_or(StoreError::NotFound)
    }

    /// Drop any pending challenge.
    pub(crate) async fn clear_security_code(&self, user_id: &UserId) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE users
            SET security_code_hash = NULL, security_code_expires_at = NULL,
                security_code_attempts = 0
            WHERE id = ?
            ",
        )
        .bind(user_id.as_str())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Address book
    // =========================================================================

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn addresses(&self, user_id: &UserId) -> Result<Vec<Address>, StoreError> {
        fetch_addresses(self.pool, user_id.as_str()).await
    }

    /// Get an address by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn address(&self, id: &AddressId) -> Result<Option<Address>, StoreError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Add an address for a user.
    ///
    /// With `make_default`, the user's previous default is cleared in the
    /// same transaction, so at most one default is ever observable.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConstraintViolation` if the user doesn't exist
    /// and `StoreError::Database` for other failures.
    pub async fn add_address(
        &self,
        user_id: &UserId,
        address: NewAddress,
        make_default: bool,
    ) -> Result<Address, StoreError> {
        let id = AddressId::generate();
        let mut tx = self.pool.begin().await?;

        if make_default {
            sqlx::query("UPDATE addresses SET is_default = 0 WHERE user_id = ? AND is_default = 1")
                .bind(user_id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r"
            INSERT INTO addresses (id, user_id, street, city, postal_code, country, is_default)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(id.as_str())
        .bind(user_id.as_str())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(make_default)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "address"))?;

        tx.commit().await?;

        self.events.notify(Table::Addresses);

        Ok(Address {
            id,
            user_id: user_id.clone(),
            street: address.street,
            city: address.city,
            postal_code: address.postal_code,
            country: address.country,
            is_default: make_default,
        })
    }

    /// Update an address's fields. The default flag is not touched here;
    /// use [`set_default_address`](Self::set_default_address).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no address has this ID and
    /// `StoreError::Database` for other failures.
    pub async fn update_address(
        &self,
        id: &AddressId,
        address: NewAddress,
    ) -> Result<Address, StoreError> {
        let result = sqlx::query(
            "UPDATE addresses SET street = ?, city = ?, postal_code = ?, country = ? WHERE id = ?",
        )
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(id.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.events.notify(Table::Addresses);
        self.address(id).await?.ok_or(StoreError::NotFound)
    }

    /// Make an address the user's default, atomically clearing the previous
    /// default in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the address doesn't exist or
    /// belongs to another user, `StoreError::Database` for other failures.
    pub async fn set_default_address(
        &self,
        user_id: &UserId,
        address_id: &AddressId,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM addresses WHERE id = ? AND user_id = ?")
                .bind(address_id.as_str())
                .bind(user_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(StoreError::NotFound);
        }

        sqlx::query("UPDATE addresses SET is_default = 0 WHERE user_id = ? AND is_default = 1")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE addresses SET is_default = 1 WHERE id = ?")
            .bind(address_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.events.notify(Table::Addresses);
        Ok(())
    }

    /// Delete an address.
    ///
    /// # Returns
    ///
    /// Returns `true` if the address was deleted, `false` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails.
    pub async fn delete_address(&self, id: &AddressId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.events.notify(Table::Addresses);
        }
        Ok(deleted)
    }

    /// Live stream of a user's addresses, default first.
    #[must_use]
    pub fn watch_addresses(
        &self,
        user_id: &UserId,
    ) -> BoxStream<'static, Result<Vec<Address>, StoreError>> {
        let pool = self.pool.clone();
        let user_id = user_id.as_str().to_owned();
        events::live(self.events, &[Table::Addresses], move || {
            let pool = pool.clone();
            let user_id = user_id.clone();
            async move { fetch_addresses(&pool, &user_id).await }
        })
    }
}

async fn fetch_addresses(pool: &SqlitePool, user_id: &str) -> Result<Vec<Address>, StoreError> {
    let rows = sqlx::query_as::<_, AddressRow>(&format!(
        r"
        SELECT {ADDRESS_COLUMNS} FROM addresses
        WHERE user_id = ?
        ORDER BY is_default DESC, city ASC, street ASC
        "
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Address::from).collect())
}
