//! Bollinger Band + RSI Reversion Strategy
//!
//! Buys when price closes at or under the lower band while Wilder RSI is
//! oversold, sells at or over the upper band while RSI is overbought.

mod config;
mod strategy;

pub use config::BollingerRsiConfig;
pub use strategy::BollingerRsiStrategy;

use crate::strategies::Strategy;
use crate::Config;
use anyhow::Result;

/// Factory function for strategy registry
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_config: BollingerRsiConfig = serde_json::from_value(config.strategy.clone())
        .map_err(|e| anyhow::anyhow!("Failed to parse bollinger_rsi config: {}", e))?;
    Ok(Box::new(BollingerRsiStrategy::new(strategy_config)))
}
