//! Tekmart CLI - store migrations and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending store migrations
//! tekmart migrate
//!
//! # Seed the demo catalog into an empty store
//! tekmart seed
//! ```
//!
//! # Environment Variables
//!
//! - `TEKMART_DATABASE_URL` - SQLite connection string (default: `sqlite://tekmart.db`)
//! - `TEKMART_DELIVERY_FEE` - Flat delivery fee (default: `300`)
//! - `RUST_LOG` - Log filter (default: `info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tekmart")]
#[command(author, version, about = "Tekmart store tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending store migrations
    Migrate,
    /// Seed the demo catalog into an empty store
    Seed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed => commands::seed::run().await,
    }
}
