//! SAR / MACD / RSI strategy configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SarMacdRsiConfig {
    // === Parabolic SAR ===
    /// Acceleration step (default: 0.02)
    pub sar_step: f64,
    /// Acceleration cap (default: 0.2)
    pub sar_max_step: f64,

    // === MACD ===
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    // === Window RSI ===
    /// Prices in the RSI window (default: 6)
    pub rsi_period: usize,
    /// Classic oversold level (default: 30)
    pub rsi_lower: f64,
    /// Classic overbought level (default: 70)
    pub rsi_upper: f64,
    /// Widening applied to the classic levels (default: 5)
    pub rsi_margin: f64,
}

impl Default for SarMacdRsiConfig {
    fn default() -> Self {
        SarMacdRsiConfig {
            sar_step: 0.02,
            sar_max_step: 0.2,
            macd_fast: 6,
            macd_slow: 16,
            macd_signal: 9,
            rsi_period: 6,
            rsi_lower: 30.0,
            rsi_upper: 70.0,
            rsi_margin: 5.0,
        }
    }
}

impl SarMacdRsiConfig {
    /// RSI range accepted for a buy: the classic levels pushed outward
    pub fn buy_band(&self) -> (f64, f64) {
        (
            self.rsi_lower - self.rsi_margin,
            self.rsi_upper + self.rsi_margin,
        )
    }

    /// RSI range accepted for a sell: the classic levels pulled inward,
    /// normalised so the bounds are ordered
    pub fn sell_band(&self) -> (f64, f64) {
        let a = self.rsi_upper - self.rsi_margin;
        let b = self.rsi_lower + self.rsi_margin;
        (a.min(b), a.max(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands() {
        let config = SarMacdRsiConfig::default();
        assert_eq!(config.buy_band(), (25.0, 75.0));
        assert_eq!(config.sell_band(), (35.0, 65.0));
    }

    #[test]
    fn test_sell_band_is_ordered_for_wide_margin() {
        let config = SarMacdRsiConfig {
            rsi_margin: 30.0,
            ..SarMacdRsiConfig::default()
        };
        assert_eq!(config.sell_band(), (40.0, 60.0));
    }
}
