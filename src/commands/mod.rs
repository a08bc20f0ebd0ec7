//! CLI subcommands

pub mod backtest;
pub mod run;
pub mod signals;
pub mod strategies;

use anyhow::{Context, Result};
use signal_trader::Config;
use std::path::PathBuf;
use tracing::info;

/// Load the config file and apply a strategy override
pub fn load_config(config_path: &str, strategy_override: Option<String>) -> Result<Config> {
    dotenv::dotenv().ok();

    let mut config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(strategy) = strategy_override {
        info!("Overriding strategy to: {}", strategy);
        config.strategy_name = strategy;
    }
    Ok(config)
}

/// Default history file for the configured market: `{data_dir}/{SYMBOL}_{timeframe}.csv`
pub fn default_data_file(config: &Config) -> PathBuf {
    PathBuf::from(&config.backtest.data_dir).join(format!(
        "{}_{}.csv",
        config.symbol(),
        config.trading.timeframe
    ))
}
