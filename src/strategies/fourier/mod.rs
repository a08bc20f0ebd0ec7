//! Fourier Cycle Strategy
//!
//! Decomposes the recent closes into harmonics, rebuilds the series from
//! the strongest few and projects it forward. A projected move larger than
//! the threshold in either direction becomes the signal.

mod config;
mod strategy;

pub use config::FourierConfig;
pub use strategy::FourierStrategy;

use crate::strategies::Strategy;
use crate::Config;
use anyhow::Result;

/// Factory function for strategy registry
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_config: FourierConfig = serde_json::from_value(config.strategy.clone())
        .map_err(|e| anyhow::anyhow!("Failed to parse fourier config: {}", e))?;
    Ok(Box::new(FourierStrategy::new(strategy_config)))
}
