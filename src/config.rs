use std::{fs::File, io::BufReader, time::Duration};

use color_eyre::eyre::{Result, eyre};
use serde::Deserialize;
use serde_with::{DisplayFromStr, DurationSeconds, serde_as};
use tracing_subscriber::{Layer, Registry, filter::LevelFilter, fmt, layer::SubscriberExt};

use crate::{
    catalog::CatalogItem,
    rcon::client::{RconTarget, RconTimeouts},
};

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    /// Defaults to a fresh sqlite file per run.
    pub database_url: Option<String>,
    pub rcon: RconConfig,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "recovery_grace_secs", default = "default_recovery_grace")]
    pub recovery_grace: Duration,
    pub catalog: Vec<CatalogItem>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RconConfig {
    #[serde(flatten)]
    pub target: RconTarget,
    #[serde(flatten)]
    pub timeouts: RconTimeouts,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct LogConfig {
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_level")]
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
        }
    }
}

fn default_level() -> LevelFilter {
    LevelFilter::WARN
}

fn default_recovery_grace() -> Duration {
    Duration::from_secs(300)
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| eyre!("Could not read config file: {}", e))?;

        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| eyre!("Invalid config file {}: {}", path, e))
    }
}

// Logs go to stderr, stdout carries the report.
pub fn init_logger(cfg: &LogConfig) -> Result<()> {
    let subscriber = Registry::default().with(
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(cfg.level),
    );

    tracing::subscriber::set_global_default(subscriber).map_err(|e| eyre!(e))
}
