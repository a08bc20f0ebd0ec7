//! Dip Buy Strategy
//!
//! Accumulates on pullbacks: buys when the last close has dropped a set
//! fraction below the highest close of a lookback window. It never sells.
//! With `reserve` sizing and `max_orders = 1` it spends everything above a
//! minimum balance on the first qualifying dip and stops.

mod config;
mod strategy;

pub use config::DipBuyConfig;
pub use strategy::DipBuyStrategy;

use crate::strategies::Strategy;
use crate::Config;
use anyhow::Result;

/// Factory function for strategy registry
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_config: DipBuyConfig = serde_json::from_value(config.strategy.clone())
        .map_err(|e| anyhow::anyhow!("Failed to parse dip_buy config: {}", e))?;
    Ok(Box::new(DipBuyStrategy::new(strategy_config)))
}
