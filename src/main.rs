#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

use std::{io, str::FromStr};

use color_eyre::eyre::{Result, eyre};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog,
    cli::CliArgs,
    config::{Config, init_logger},
    delivery::DeliveryService,
    query::purchase::init_purchases_table,
    rcon::client::RconClient,
    shop::Shop,
};

mod catalog;
pub(crate) mod cli;
mod config;
mod csv;
mod delivery;
mod domain;
mod ledger;
mod query;
mod rcon;
mod shop;

// Kept across runs so recovery can find purchases interrupted by a crash.
const DEFAULT_DATABASE_URL: &str = "sqlite:rcon-shop.db?mode=rwc";

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::load()?;
    let config = Config::load(&cli_args.config_file_path)?;
    init_logger(&config.log)?;

    // Event store and purchase projection share one sqlite db.
    let database_url = config
        .database_url
        .clone()
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());
    let sqlite_pool = sqlite_pool(&database_url).await?;
    init_storage(&sqlite_pool).await?;

    let catalog = Catalog::new(config.catalog)?;
    let service = DeliveryService::new(sqlite_pool, RconClient::new(config.rcon.timeouts));

    let recovered = service.recover_stale(config.recovery_grace).await?;
    if recovered > 0 {
        info!("Closed {} interrupted purchases", recovered);
    }

    let shop = Shop::new(service, catalog, config.rcon.target);
    let rows = csv::read_input::<csv::CsvOrderRecord>(&cli_args.orders_file_path)?;

    let mut report = vec![];
    for row_result in rows {
        match row_result {
            Ok(row) => match shop.handle(row).await {
                Ok(Some(line)) => report.push(line),
                Ok(None) => {}
                Err(e) => debug!("Error processing row: {}", e),
            },
            Err(e) => debug!("Error parsing row: {}", e),
        }
    }

    csv::write_report(io::stdout(), &report)?;

    Ok(())
}

async fn sqlite_pool(sqlite_uri: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(sqlite_uri)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
    SqlitePool::connect_with(opts).await.map_err(|e| eyre!(e))
}

async fn init_storage(sqlite_pool: &SqlitePool) -> Result<()> {
    // Fails on a reused db whose event tables already exist.
    if let Err(e) = sqlite_es::init_tables(sqlite_pool).await {
        warn!("Event store tables not created: {}", e);
    }
    init_purchases_table(sqlite_pool).await
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // A single connection that never expires, so the in-memory db lives as long as the pool.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_storage(&pool).await.unwrap();
    pool
}
