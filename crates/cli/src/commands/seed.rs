//! Catalog seeding command.
//!
//! Fills an empty store with the demo categories and products. Tables that
//! already hold data are left untouched, so the command is safe to re-run.

use tracing::info;

use tekmart_store::config::StoreConfig;
use tekmart_store::{Store, seed};

/// Seed the demo catalog.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the store cannot be
/// opened, or a seed write fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;
    let store = Store::connect(config).await?;

    let summary = seed::seed_catalog(&store).await?;

    if summary.categories == 0 && summary.products == 0 {
        info!("Catalog already populated, nothing to do");
    } else {
        info!(
            categories = summary.categories,
            products = summary.products,
            "Seeding complete!"
        );
    }
    Ok(())
}
