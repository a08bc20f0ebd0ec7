use crate::data::closes;
use crate::indicators::{bollinger_bands, last_value, rsi};
use crate::strategies::{last_close, Evaluation, Strategy};
use crate::{Candle, Signal};

use super::config::BollingerRsiConfig;

pub struct BollingerRsiStrategy {
    config: BollingerRsiConfig,
}

impl BollingerRsiStrategy {
    pub fn new(config: BollingerRsiConfig) -> Self {
        BollingerRsiStrategy { config }
    }
}

impl Strategy for BollingerRsiStrategy {
    fn name(&self) -> &'static str {
        "bollinger_rsi"
    }

    fn warmup(&self) -> usize {
        self.config.bb_period.max(self.config.rsi_period + 1)
    }

    fn evaluate(&self, candles: &[Candle]) -> Evaluation {
        let price = last_close(candles);
        if candles.len() < self.warmup() {
            return Evaluation::hold(price);
        }

        let close = closes(candles);
        let (upper, middle, lower) =
            bollinger_bands(&close, self.config.bb_period, self.config.bb_std);
        let rsi_values = rsi(&close, self.config.rsi_period);

        let (Some(upper), Some(middle), Some(lower), Some(current_rsi)) = (
            last_value(&upper),
            last_value(&middle),
            last_value(&lower),
            last_value(&rsi_values),
        ) else {
            return Evaluation::hold(price);
        };

        let signal = if price <= lower && current_rsi <= self.config.rsi_oversold {
            Signal::Buy
        } else if price >= upper && current_rsi >= self.config.rsi_overbought {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Evaluation::new(signal, price)
            .with("bb_upper", upper)
            .with("bb_middle", middle)
            .with("bb_lower", lower)
            .with("rsi", current_rsi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::candles_from_closes;

    fn flat_then(last: &[f64]) -> Vec<f64> {
        let mut closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        closes.extend_from_slice(last);
        closes
    }

    #[test]
    fn test_buys_on_capitulation() {
        let closes = flat_then(&[97.0, 94.0, 90.0]);
        let evaluation = BollingerRsiStrategy::new(BollingerRsiConfig::default())
            .evaluate(&candles_from_closes(&closes));
        assert_eq!(evaluation.signal, Signal::Buy);
        assert!(evaluation.indicators["rsi"] < 30.0);
    }

    #[test]
    fn test_sells_on_blow_off() {
        let closes = flat_then(&[103.0, 106.0, 110.0]);
        let evaluation = BollingerRsiStrategy::new(BollingerRsiConfig::default())
            .evaluate(&candles_from_closes(&closes));
        assert_eq!(evaluation.signal, Signal::Sell);
    }

    #[test]
    fn test_holds_in_range() {
        let closes = flat_then(&[100.2]);
        let evaluation = BollingerRsiStrategy::new(BollingerRsiConfig::default())
            .evaluate(&candles_from_closes(&closes));
        assert_eq!(evaluation.signal, Signal::Hold);
        assert_eq!(evaluation.indicators.len(), 4);
    }
}
