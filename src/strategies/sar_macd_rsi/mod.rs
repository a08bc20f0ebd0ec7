//! SAR / MACD / RSI confluence strategy
//!
//! Trades only when three independent readings agree on the latest bar:
//! the Parabolic SAR side of price, the direction of the MACD crossover and
//! a short-window RSI inside a band around the classic 30/70 levels.

mod config;
mod strategy;

pub use config::SarMacdRsiConfig;
pub use strategy::SarMacdRsiStrategy;

use crate::strategies::Strategy;
use crate::Config;
use anyhow::Result;

/// Factory function for strategy registry
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_config: SarMacdRsiConfig = serde_json::from_value(config.strategy.clone())
        .map_err(|e| anyhow::anyhow!("Failed to parse sar_macd_rsi config: {}", e))?;
    Ok(Box::new(SarMacdRsiStrategy::new(strategy_config)))
}
