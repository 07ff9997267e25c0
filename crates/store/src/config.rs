//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `TEKMART_DATABASE_URL` - SQLite connection string (default: `sqlite://tekmart.db`)
//! - `TEKMART_DELIVERY_FEE` - Flat delivery fee added to every order (default: `300`)

use secrecy::SecretString;
use thiserror::Error;

use tekmart_core::Price;

/// Default on-disk database location.
const DEFAULT_DATABASE_URL: &str = "sqlite://tekmart.db";

/// Flat delivery fee, in whole currency units, used when none is configured.
pub const DEFAULT_DELIVERY_FEE: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite connection string (may contain credentials on shared setups).
    pub database_url: SecretString,
    /// Flat fee added on top of the cart subtotal at checkout.
    pub delivery_fee: Price,
}

impl StoreConfig {
    /// Configuration for a database at the given URL, with default fees.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: SecretString::from(database_url.into()),
            delivery_fee: Price::from_major(DEFAULT_DELIVERY_FEE),
        }
    }

    /// Configuration for a private in-memory database.
    ///
    /// Used by tests and throwaway tooling; the store disappears when the
    /// pool is dropped.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    /// Override the delivery fee.
    #[must_use]
    pub fn with_delivery_fee(mut self, fee: Price) -> Self {
        self.delivery_fee = fee;
        self
    }

    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `TEKMART_DELIVERY_FEE` is set
    /// but is not a non-negative decimal number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("TEKMART_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());

        let delivery_fee = match std::env::var("TEKMART_DELIVERY_FEE") {
            Ok(raw) => Price::parse(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("TEKMART_DELIVERY_FEE".into(), e.to_string())
            })?,
            Err(_) => Price::from_major(DEFAULT_DELIVERY_FEE),
        };

        Ok(Self {
            database_url: SecretString::from(database_url),
            delivery_fee,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::in_memory();
        assert_eq!(config.delivery_fee, Price::from_major(300));
    }

    #[test]
    fn test_with_delivery_fee() {
        let config = StoreConfig::in_memory().with_delivery_fee(Price::from_major(0));
        assert_eq!(config.delivery_fee, Price::ZERO);
    }
}
