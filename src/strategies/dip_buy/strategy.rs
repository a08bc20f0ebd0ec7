use crate::strategies::{last_close, Evaluation, Strategy};
use crate::{Candle, Signal};

use super::config::DipBuyConfig;

pub struct DipBuyStrategy {
    config: DipBuyConfig,
}

impl DipBuyStrategy {
    pub fn new(config: DipBuyConfig) -> Self {
        DipBuyStrategy { config }
    }
}

impl Strategy for DipBuyStrategy {
    fn name(&self) -> &'static str {
        "dip_buy"
    }

    fn warmup(&self) -> usize {
        self.config.lookback.max(1)
    }

    fn evaluate(&self, candles: &[Candle]) -> Evaluation {
        let price = last_close(candles);
        if candles.len() < self.warmup() {
            return Evaluation::hold(price);
        }

        let window = &candles[candles.len() - self.warmup()..];
        let recent_high = window
            .iter()
            .map(|c| c.close)
            .fold(f64::NEG_INFINITY, f64::max);
        if !recent_high.is_finite() || recent_high <= 0.0 {
            return Evaluation::hold(price);
        }

        let drawdown = 1.0 - price / recent_high;
        let signal = if drawdown >= self.config.dip_pct {
            Signal::Buy
        } else {
            Signal::Hold
        };

        Evaluation::new(signal, price)
            .with("recent_high", recent_high)
            .with("drawdown", drawdown)
    }
}
