//! Authentication service and security-code state machine.
//!
//! Login is two-factor: password first, then a short numeric code delivered
//! out-of-band. The session walks `LoggedOut → AwaitingSecurityCode →
//! Authenticated` (the transient authenticating phase is the duration of
//! the [`login`](AuthService::login) call itself); registration
//! authenticates directly. Sessions are plain values owned by the caller -
//! nothing here is process-global, and nothing survives a restart.
//!
//! Code delivery is an external collaborator behind [`SecurityCodeSender`];
//! the generated code is never returned to the caller that requested the
//! login, only its argon2 hash is stored.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use rand::Rng;
use thiserror::Error;

use tekmart_core::{Email, Role, UserId};

use crate::db::{Store, StoreError};
use crate::models::{CartScope, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// How long a security code stays valid, in minutes.
const CODE_TTL_MINUTES: i64 = 5;

/// Wrong codes allowed before the challenge is voided.
const MAX_CODE_ATTEMPTS: i64 = 5;

/// Failure reported by a [`SecurityCodeSender`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodeDeliveryError(pub String);

/// Out-of-band delivery channel for security codes (SMS, email).
///
/// Implementations must not surface the code on the device that initiated
/// the login; doing so would void the second factor.
#[async_trait]
pub trait SecurityCodeSender: Send + Sync {
    /// Deliver `code` to the user behind `email`.
    async fn deliver(&self, email: &Email, code: &str) -> Result<(), CodeDeliveryError>;
}

/// Where a session currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No user is signed in.
    #[default]
    LoggedOut,
    /// Password accepted; waiting for the delivered security code.
    AwaitingSecurityCode {
        /// The user being challenged.
        user_id: UserId,
    },
    /// Fully signed in.
    Authenticated {
        /// The signed-in user.
        user: User,
    },
}

/// A caller-owned authentication session.
///
/// Create one per front-end session and pass it to the [`AuthService`]
/// operations; it is never persisted, so every process start begins
/// logged out.
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    state: AuthState,
}

impl AuthSession {
    /// A fresh, logged-out session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AuthState::LoggedOut,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &AuthState {
        &self.state
    }

    /// Whether a user is fully signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated { user } => Some(user),
            _ => None,
        }
    }
}

/// Authentication service.
///
/// Handles registration, the two-step login flow and logout.
pub struct AuthService<'a> {
    store: &'a Store,
}

impl<'a> AuthService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Register a new user and sign them in directly.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid,
    /// `AuthError::WeakPassword` if the password doesn't meet requirements,
    /// and `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        session: &mut AuthSession,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .users()
            .create(&email, &password_hash, Role::User)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        session.state = AuthState::Authenticated { user: user.clone() };
        Ok(user)
    }

    /// First login factor: verify the password, then issue and deliver a
    /// security code.
    ///
    /// On success the session moves to `AwaitingSecurityCode` and a fresh
    /// 4-digit code (uniform in [1000, 9999]) is hashed onto the user row,
    /// replacing any pending one, and handed to `sender` for out-of-band
    /// delivery. The code itself is not returned.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email and for
    /// a wrong password alike, and `AuthError::Delivery` if the sender
    /// fails; in every error case the session ends up `LoggedOut`.
    pub async fn login(
        &self,
        session: &mut AuthSession,
        email: &str,
        password: &str,
        sender: &dyn SecurityCodeSender,
    ) -> Result<(), AuthError> {
        session.state = AuthState::LoggedOut;

        let email = Email::parse(email)?;
        let users = self.store.users();

        let Some((user, password_hash)) = users.get_password_hash(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        verify_password(password, &password_hash)?;

        let code = generate_security_code();
        let code_hash = hash_password(&code)?;
        users
            .set_security_code(&user.id, &code_hash, Utc::now() + TimeDelta::minutes(CODE_TTL_MINUTES))
            .await?;

        sender.deliver(&user.email, &code).await?;

        tracing::info!(user_id = %user.id, "login challenge issued");
        session.state = AuthState::AwaitingSecurityCode { user_id: user.id };
        Ok(())
    }

    /// Second login factor: verify the delivered security code.
    ///
    /// On success the pending challenge is cleared and the session becomes
    /// `Authenticated`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoPendingChallenge` if the session is not
    /// awaiting a code, `AuthError::CodeExpired` past the code's lifetime,
    /// `AuthError::TooManyAttempts` after repeated wrong codes (the
    /// challenge is voided and the session reset), and
    /// `AuthError::InvalidCredentials` for a wrong code.
    pub async fn verify_security_code(
        &self,
        session: &mut AuthSession,
        code: &str,
    ) -> Result<User, AuthError> {
        let AuthState::AwaitingSecurityCode { user_id } = &session.state else {
            return Err(AuthError::NoPendingChallenge);
        };
        let user_id = user_id.clone();
        let users = self.store.users();

        let Some(challenge) = users.security_challenge(&user_id).await? else {
            session.state = AuthState::LoggedOut;
            return Err(AuthError::NoPendingChallenge);
        };

        if challenge.expires_at < Utc::now() {
            users.clear_security_code(&user_id).await?;
            session.state = AuthState::LoggedOut;
            return Err(AuthError::CodeExpired);
        }

        if challenge.attempts >= MAX_CODE_ATTEMPTS {
            users.clear_security_code(&user_id).await?;
            session.state = AuthState::LoggedOut;
            return Err(AuthError::TooManyAttempts);
        }

        if verify_password(code, &challenge.hash).is_err() {
            let attempts = users.record_code_attempt(&user_id).await?;
            if attempts >= MAX_CODE_ATTEMPTS {
                users.clear_security_code(&user_id).await?;
                session.state = AuthState::LoggedOut;
                tracing::warn!(user_id = %user_id, "challenge voided after too many wrong codes");
                return Err(AuthError::TooManyAttempts);
            }
            return Err(AuthError::InvalidCredentials);
        }

        users.clear_security_code(&user_id).await?;
        let user = users
            .get(&user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        tracing::info!(user_id = %user.id, "login complete");
        session.state = AuthState::Authenticated { user: user.clone() };
        Ok(user)
    }

    /// Sign out.
    ///
    /// Clears the session and the signed-in user's cart (the guest cart is
    /// untouched); an abandoned code challenge is voided. Stored
    /// credentials are kept.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if clearing state in the store fails.
    pub async fn logout(&self, session: &mut AuthSession) -> Result<(), AuthError> {
        match std::mem::take(&mut session.state) {
            AuthState::Authenticated { user } => {
                let removed = self
                    .store
                    .cart()
                    .clear(&CartScope::User(user.id.clone()))
                    .await?;
                tracing::info!(user_id = %user.id, cart_lines = removed, "logged out");
            }
            AuthState::AwaitingSecurityCode { user_id } => {
                self.store.users().clear_security_code(&user_id).await?;
            }
            AuthState::LoggedOut => {}
        }
        Ok(())
    }
}

/// Generate a 4-digit security code, uniform in [1000, 9999].
fn generate_security_code() -> String {
    rand::rng().random_range(1000..=9999_u16).to_string()
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a secret (password or security code) using Argon2id.
fn hash_password(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a secret against a stored hash.
fn verify_password(secret: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(secret.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
