//! Store migration command.
//!
//! Opens the configured store, creating the database file if necessary,
//! and applies any pending migrations.

use tracing::info;

use tekmart_store::Store;
use tekmart_store::config::StoreConfig;

/// Apply pending store migrations.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the store cannot be
/// opened, or a migration fails to apply.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;

    info!("Connecting to store...");
    let _store = Store::connect(config).await?;

    info!("Migrations complete!");
    Ok(())
}
