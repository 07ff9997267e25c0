//! Authentication error types.

use thiserror::Error;

use tekmart_core::EmailError;

use super::CodeDeliveryError;
use crate::db::StoreError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Wrong email, password or security code. Deliberately one variant
    /// with one message, so callers cannot leak which part was wrong.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration with an email that is already taken.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// A code was submitted but no login challenge is pending.
    #[error("no login challenge is pending")]
    NoPendingChallenge,

    /// The pending security code has expired; log in again.
    #[error("security code expired")]
    CodeExpired,

    /// Too many wrong codes; the challenge is void, log in again.
    #[error("too many incorrect codes")]
    TooManyAttempts,

    /// The out-of-band code delivery collaborator failed.
    #[error("code delivery failed: {0}")]
    Delivery(#[from] CodeDeliveryError),

    /// Repository/database error.
    #[error("store error: {0}")]
    Repository(#[from] StoreError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
