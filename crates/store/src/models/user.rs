//! User and address domain types.
//!
//! The password hash and any pending security-code challenge stay inside the
//! repository layer; domain `User` values never carry credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tekmart_core::{AddressId, Email, Role, UserId};

/// A registered user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized unique email address.
    pub email: Email,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional contact phone.
    pub phone: Option<String>,
    /// Access role.
    pub role: Role,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Unique address ID.
    pub id: AddressId,
    /// Owning user; addresses are cascade-deleted with the account.
    pub user_id: UserId,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    /// Whether this is the user's default delivery address. At most one
    /// address per user carries this flag at any observable point.
    pub is_default: bool,
}

/// Input for creating or editing an address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}
