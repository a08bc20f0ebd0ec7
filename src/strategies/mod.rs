//! Trading Strategies Module
//!
//! Every strategy turns the latest candle window into a Buy / Sell / Hold
//! decision through threshold rules over indicator values. Strategies are
//! created by name through a registry so the config picks one without any
//! hardcoded dispatch in the trading loop.

pub mod bollinger_rsi;
pub mod dip_buy;
pub mod fourier;
pub mod ornstein_uhlenbeck;
pub mod sar_macd_rsi;

use crate::{Candle, Config, Order, Signal};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{OnceLock, RwLock};

// =============================================================================
// Evaluation - what a strategy decided and why
// =============================================================================

/// Decision for the latest bar together with the indicator values behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub signal: Signal,
    /// Reference price of the decision (last close)
    pub price: f64,
    pub indicators: BTreeMap<&'static str, f64>,
}

impl Evaluation {
    pub fn hold(price: f64) -> Self {
        Evaluation {
            signal: Signal::Hold,
            price,
            indicators: BTreeMap::new(),
        }
    }

    pub fn new(signal: Signal, price: f64) -> Self {
        Evaluation {
            signal,
            price,
            indicators: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: f64) -> Self {
        self.indicators.insert(name, value);
        self
    }

    /// `name=value` pairs for log lines
    pub fn describe(&self) -> String {
        self.indicators
            .iter()
            .map(|(name, value)| format!("{}={:.4}", name, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Strategy Trait - The contract all strategies must implement
// =============================================================================

/// Trading strategy trait.
pub trait Strategy: Send + Sync {
    /// Strategy identifier (must match config's strategy_name)
    fn name(&self) -> &'static str;

    /// Candles needed before the strategy can emit anything but Hold
    fn warmup(&self) -> usize;

    /// Decide on the latest bar of `candles` (oldest first)
    fn evaluate(&self, candles: &[Candle]) -> Evaluation;

    /// Notification after an order for this strategy was filled
    fn on_fill(&mut self, order: &Order) {
        tracing::debug!(
            strategy = self.name(),
            side = %order.side,
            quantity = order.quantity,
            price = order.price,
            "Order filled"
        );
    }

    /// Initialize strategy (called once before trading starts)
    fn init(&mut self) {}
}

/// Last close of the window, or 0 when empty
pub(crate) fn last_close(candles: &[Candle]) -> f64 {
    candles.last().map(|c| c.close).unwrap_or(0.0)
}

// =============================================================================
// Strategy Factory - Type alias for strategy constructor functions
// =============================================================================

/// Factory function type for creating strategies from config
pub type StrategyFactory = fn(&Config) -> Result<Box<dyn Strategy>>;

// =============================================================================
// Strategy Registry - Dynamic registration without hardcoding
// =============================================================================

/// Global strategy registry
static REGISTRY: OnceLock<RwLock<HashMap<&'static str, StrategyFactory>>> = OnceLock::new();

fn get_registry() -> &'static RwLock<HashMap<&'static str, StrategyFactory>> {
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("sar_macd_rsi", sar_macd_rsi::create as StrategyFactory);
        map.insert("dip_buy", dip_buy::create as StrategyFactory);
        map.insert("bollinger_rsi", bollinger_rsi::create as StrategyFactory);
        map.insert("fourier", fourier::create as StrategyFactory);
        map.insert(
            "ornstein_uhlenbeck",
            ornstein_uhlenbeck::create as StrategyFactory,
        );
        RwLock::new(map)
    })
}

/// Create a strategy from configuration
pub fn create_strategy(config: &Config) -> Result<Box<dyn Strategy>> {
    let registry = get_registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let strategy_name = config.strategy_name.as_str();
    let factory = registry.get(strategy_name).ok_or_else(|| {
        let mut available: Vec<_> = registry.keys().copied().collect();
        available.sort_unstable();
        anyhow::anyhow!(
            "Unknown strategy: '{}'. Available: {}",
            strategy_name,
            available.join(", ")
        )
    })?;

    factory(config)
}

/// Get list of available strategy names, sorted
pub fn available_strategies() -> Vec<&'static str> {
    let mut names: Vec<_> = get_registry()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .keys()
        .copied()
        .collect();
    names.sort_unstable();
    names
}

/// Register a new strategy (for plugins or testing)
pub fn register_strategy(name: &'static str, factory: StrategyFactory) {
    get_registry()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .insert(name, factory);
}
