//! Ornstein-Uhlenbeck Mean Reversion Strategy
//!
//! Fits an OU process to the recent closes and trades stretched deviations
//! from the fitted equilibrium: buy when price sits `entry_z` stationary
//! standard deviations below it, sell when it sits as far above.

mod config;
mod strategy;

pub use config::OrnsteinUhlenbeckConfig;
pub use strategy::OrnsteinUhlenbeckStrategy;

use crate::strategies::Strategy;
use crate::Config;
use anyhow::Result;

/// Factory function for strategy registry
pub fn create(config: &Config) -> Result<Box<dyn Strategy>> {
    let strategy_config: OrnsteinUhlenbeckConfig =
        serde_json::from_value(config.strategy.clone())
            .map_err(|e| anyhow::anyhow!("Failed to parse ornstein_uhlenbeck config: {}", e))?;
    Ok(Box::new(OrnsteinUhlenbeckStrategy::new(strategy_config)))
}
