// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use server::{config::Config, database, seed};
use tracing_subscriber::EnvFilter;

/// Populate the punchclock database with demo data.
#[derive(Parser)]
#[command(name = "seed", version = env!("CARGO_PKG_VERSION"), long_about = None)]
struct Cli {
    /// Only ensure the demo user, clients and projects exist (no attendance history)
    #[arg(long)]
    minimal: bool,

    /// Override the database URL from the environment
    #[arg(long = "database-url")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let database_url = cli.database_url.unwrap_or(config.database_url);
    let pool = database::establish_connection_pool(&database_url).await?;

    if cli.minimal {
        seed::seed_minimal(&pool).await?;
    } else {
        seed::seed_full(&pool, Utc::now().date_naive()).await?;
    }

    pool.close().await;
    Ok(())
}
