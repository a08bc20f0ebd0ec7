//! SAR / MACD / RSI Strategy
//!
//! ## Entry Conditions
//! - Buy: SAR below price, bullish MACD crossover, window RSI in the buy band
//! - Sell: SAR above price, bearish MACD crossover, window RSI in the sell band
//!
//! Anything else holds. The trading loop takes care of not repeating the
//! same side twice in a row.

use crate::data::{closes, highs, lows};
use crate::indicators::{macd, macd_crossover, parabolic_sar, window_rsi, MacdCrossover};
use crate::strategies::{last_close, Evaluation, Strategy};
use crate::{Candle, Signal};

use super::config::SarMacdRsiConfig;

/// Indicator readings on the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub price: f64,
    pub sar: f64,
    pub crossover: Option<MacdCrossover>,
    pub rsi: f64,
}

pub struct SarMacdRsiStrategy {
    config: SarMacdRsiConfig,
}

impl SarMacdRsiStrategy {
    pub fn new(config: SarMacdRsiConfig) -> Self {
        SarMacdRsiStrategy { config }
    }

    pub fn config(&self) -> &SarMacdRsiConfig {
        &self.config
    }

    fn readings(&self, candles: &[Candle]) -> Option<(Readings, f64)> {
        let close = closes(candles);
        let sar = parabolic_sar(
            &highs(candles),
            &lows(candles),
            self.config.sar_step,
            self.config.sar_max_step,
        );
        let (macd_line, signal_line, _) = macd(
            &close,
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        );

        let readings = Readings {
            price: *close.last()?,
            sar: *sar.last()?,
            crossover: macd_crossover(&macd_line, &signal_line),
            rsi: window_rsi(&close, self.config.rsi_period)?,
        };
        let macd_value = macd_line.last().copied().flatten()?;
        Some((readings, macd_value))
    }

    /// Apply the entry rules to one set of readings
    pub fn decide(&self, r: &Readings) -> Signal {
        let in_band = |(lo, hi): (f64, f64)| r.rsi >= lo && r.rsi <= hi;

        match r.crossover {
            Some(MacdCrossover::Bullish) if r.sar < r.price && in_band(self.config.buy_band()) => {
                Signal::Buy
            }
            Some(MacdCrossover::Bearish)
                if r.sar > r.price && in_band(self.config.sell_band()) =>
            {
                Signal::Sell
            }
            _ => Signal::Hold,
        }
    }
}

impl Strategy for SarMacdRsiStrategy {
    fn name(&self) -> &'static str {
        "sar_macd_rsi"
    }

    fn warmup(&self) -> usize {
        (self.config.macd_slow + self.config.macd_signal).max(self.config.rsi_period)
    }

    fn evaluate(&self, candles: &[Candle]) -> Evaluation {
        let price = last_close(candles);
        if candles.len() < self.warmup() {
            return Evaluation::hold(price);
        }

        let Some((readings, macd_value)) = self.readings(candles) else {
            return Evaluation::hold(price);
        };

        let crossover = match readings.crossover {
            Some(MacdCrossover::Bullish) => 1.0,
            Some(MacdCrossover::Bearish) => -1.0,
            None => 0.0,
        };

        Evaluation::new(self.decide(&readings), price)
            .with("sar", readings.sar)
            .with("macd", macd_value)
            .with("macd_cross", crossover)
            .with("rsi", readings.rsi)
    }
}
