use crate::data::closes;
use crate::indicators::ou::{OuParams, MIN_SAMPLES};
use crate::strategies::{last_close, Evaluation, Strategy};
use crate::{Candle, Signal};

use super::config::OrnsteinUhlenbeckConfig;

pub struct OrnsteinUhlenbeckStrategy {
    config: OrnsteinUhlenbeckConfig,
}

impl OrnsteinUhlenbeckStrategy {
    pub fn new(config: OrnsteinUhlenbeckConfig) -> Self {
        OrnsteinUhlenbeckStrategy { config }
    }

    fn decide(&self, params: &OuParams, price: f64) -> Signal {
        if let Some(max) = self.config.max_half_life {
            if params.half_life > max {
                return Signal::Hold;
            }
        }

        let z = params.z_score(price);
        let next = params.predict(price, 1);
        let agrees = |up: bool| {
            !self.config.require_prediction || if up { next > price } else { next < price }
        };

        if z < -self.config.entry_z && agrees(true) {
            Signal::Buy
        } else if z > self.config.entry_z && agrees(false) {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

impl Strategy for OrnsteinUhlenbeckStrategy {
    fn name(&self) -> &'static str {
        "ornstein_uhlenbeck"
    }

    fn warmup(&self) -> usize {
        self.config.window.max(MIN_SAMPLES)
    }

    fn evaluate(&self, candles: &[Candle]) -> Evaluation {
        let price = last_close(candles);
        if candles.len() < self.warmup() {
            return Evaluation::hold(price);
        }

        let close = closes(&candles[candles.len() - self.warmup()..]);
        let Some(params) = OuParams::estimate(&close) else {
            return Evaluation::hold(price);
        };

        let mut evaluation = Evaluation::new(self.decide(&params, price), price)
            .with("ou_mu", params.mu)
            .with("ou_sigma", params.sigma)
            .with("ou_half_life", params.half_life)
            .with("z_score", params.z_score(price))
            .with("ou_next", params.predict(price, 1));
        if let Some(p) = params.continuation_probability(price) {
            evaluation = evaluation.with("p_continue", p);
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::candles_from_closes;

    fn params() -> OuParams {
        OuParams {
            mu: 100.0,
            theta: -(0.8_f64).ln(),
            sigma: 2.0,
            b: 0.8,
            half_life: std::f64::consts::LN_2 / -(0.8_f64).ln(),
        }
    }

    fn strategy() -> OrnsteinUhlenbeckStrategy {
        OrnsteinUhlenbeckStrategy::new(OrnsteinUhlenbeckConfig::default())
    }

    #[test]
    fn test_decide_thresholds() {
        let s = strategy();
        assert_eq!(s.decide(&params(), 95.0), Signal::Buy);
        assert_eq!(s.decide(&params(), 105.0), Signal::Sell);
        assert_eq!(s.decide(&params(), 101.0), Signal::Hold);
    }

    #[test]
    fn test_half_life_filter() {
        let s = OrnsteinUhlenbeckStrategy::new(OrnsteinUhlenbeckConfig {
            max_half_life: Some(1.0),
            ..OrnsteinUhlenbeckConfig::default()
        });
        assert_eq!(s.decide(&params(), 95.0), Signal::Hold);
    }

    #[test]
    fn test_buys_sharp_drop_in_ranging_market() {
        let mut closes: Vec<f64> = (0..99)
            .map(|i| 100.0 + 2.0 * (i as f64 * 1.3).sin())
            .collect();
        closes.push(93.0);

        let evaluation = strategy().evaluate(&candles_from_closes(&closes));
        assert_eq!(evaluation.signal, Signal::Buy);
        assert!(evaluation.indicators["z_score"] < -2.0);
    }

    #[test]
    fn test_holds_on_trend() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let evaluation = strategy().evaluate(&candles_from_closes(&closes));
        assert_eq!(evaluation.signal, Signal::Hold);
        assert!(evaluation.indicators.is_empty());
    }
}
