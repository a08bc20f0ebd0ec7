use crate::data::closes;
use crate::indicators::fourier::{dominant_cycles, extrapolate, MIN_SAMPLES};
use crate::strategies::{last_close, Evaluation, Strategy};
use crate::{Candle, Signal};

use super::config::FourierConfig;

pub struct FourierStrategy {
    config: FourierConfig,
}

impl FourierStrategy {
    pub fn new(config: FourierConfig) -> Self {
        FourierStrategy { config }
    }
}

impl Strategy for FourierStrategy {
    fn name(&self) -> &'static str {
        "fourier"
    }

    fn warmup(&self) -> usize {
        self.config.window.max(MIN_SAMPLES)
    }

    fn evaluate(&self, candles: &[Candle]) -> Evaluation {
        let price = last_close(candles);
        if candles.len() < self.warmup() || price <= 0.0 {
            return Evaluation::hold(price);
        }

        let close = closes(&candles[candles.len() - self.warmup()..]);
        let Some(projected) = extrapolate(
            &close,
            self.config.harmonics,
            self.config.horizon,
            self.config.detrend,
        ) else {
            return Evaluation::hold(price);
        };

        let expected_return = projected / price - 1.0;
        let signal = if expected_return > self.config.threshold {
            Signal::Buy
        } else if expected_return < -self.config.threshold {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let mut evaluation = Evaluation::new(signal, price)
            .with("projected", projected)
            .with("expected_return", expected_return);
        if let Some(top) = dominant_cycles(&close, 1, self.config.detrend).first() {
            evaluation = evaluation
                .with("dominant_period", top.period)
                .with("dominant_amplitude", top.amplitude);
        }
        evaluation
    }
}
