//! Bollinger Band + RSI strategy configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerRsiConfig {
    // === Bollinger Band Parameters ===
    /// Bollinger Band period (default: 20)
    pub bb_period: usize,
    /// Bollinger Band standard deviation multiplier (default: 2.0)
    pub bb_std: f64,

    // === RSI Parameters ===
    /// RSI calculation period (default: 14)
    pub rsi_period: usize,
    /// RSI oversold threshold for buys (default: 30)
    pub rsi_oversold: f64,
    /// RSI overbought threshold for sells (default: 70)
    pub rsi_overbought: f64,
}

impl Default for BollingerRsiConfig {
    fn default() -> Self {
        BollingerRsiConfig {
            bb_period: 20,
            bb_std: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}
