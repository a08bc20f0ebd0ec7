//! Technical indicators
//!
//! Moving averages, RSI, Bollinger Bands and MACD are thin wrappers around the
//! `ta` crate. Indicators the crate does not ship (window RSI, Parabolic SAR,
//! MACD crossover, spectral decomposition, Ornstein-Uhlenbeck fit) are
//! implemented here over plain `&[f64]` windows.
//!
//! Series functions return one entry per input value, `None` during warmup.

pub mod fourier;
pub mod ou;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use ta::indicators::{
    BollingerBands as TaBB, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;

pub use fourier::{dominant_cycles, extrapolate, spectrum, SpectralComponent};
pub use ou::OuParams;

// =============================================================================
// Type Aliases for Complex Return Types
// =============================================================================

/// Type alias for band indicators (upper, middle, lower)
pub type BandOutput = (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>);

/// Last defined value of a series
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let sma_val = indicator.next(value);
            (i + 1 >= period).then_some(sma_val)
        })
        .collect()
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match ExponentialMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let ema_val = indicator.next(value);
            (i + 1 >= period).then_some(ema_val)
        })
        .collect()
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI (Relative Strength Index) using ta crate (Wilder smoothing)
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match RelativeStrengthIndex::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let rsi_val = indicator.next(value);
            (i + 1 >= period).then_some(rsi_val)
        })
        .collect()
}

/// RSI over the last `period` prices only.
///
/// Average gain is the mean of the positive one-step changes in the window,
/// average loss the mean of the absolute negative changes. A window without
/// losses reads 100 when it has gains and 50 when flat.
pub fn window_rsi(values: &[f64], period: usize) -> Option<f64> {
    if period < 2 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let (gains, losses): (Vec<f64>, Vec<f64>) = window
        .iter()
        .tuple_windows()
        .map(|(prev, next)| next - prev)
        .filter(|delta| *delta != 0.0)
        .partition(|delta| *delta > 0.0);

    let avg_gain = mean(&gains);
    let avg_loss = mean(&losses).abs();

    if avg_loss == 0.0 {
        return Some(if avg_gain > 0.0 { 100.0 } else { 50.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Calculate MACD using ta crate, returns (macd, signal, histogram)
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> BandOutput {
    if values.is_empty() {
        return (vec![], vec![], vec![]);
    }

    let mut indicator =
        match MovingAverageConvergenceDivergence::new(fast_period, slow_period, signal_period) {
            Ok(i) => i,
            Err(_) => {
                return (
                    vec![None; values.len()],
                    vec![None; values.len()],
                    vec![None; values.len()],
                )
            }
        };

    let warmup = slow_period;
    let mut macd_line = Vec::with_capacity(values.len());
    let mut signal_line = Vec::with_capacity(values.len());
    let mut histogram = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let out = indicator.next(value);
        if i + 1 >= warmup {
            macd_line.push(Some(out.macd));
            signal_line.push(Some(out.signal));
            histogram.push(Some(out.histogram));
        } else {
            macd_line.push(None);
            signal_line.push(None);
            histogram.push(None);
        }
    }

    (macd_line, signal_line, histogram)
}

/// Direction of a MACD crossover on the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdCrossover {
    Bullish,
    Bearish,
}

/// Classify the latest bar of a MACD series.
///
/// Bullish: MACD rose from the previous bar and is above its signal line.
/// Bearish: MACD fell from the previous bar and is below its signal line.
pub fn macd_crossover(
    macd_line: &[Option<f64>],
    signal_line: &[Option<f64>],
) -> Option<MacdCrossover> {
    let n = macd_line.len();
    if n < 2 {
        return None;
    }

    let previous = macd_line[n - 2]?;
    let current = macd_line[n - 1]?;
    let signal = last_value(signal_line)?;

    if previous < current && signal < current {
        Some(MacdCrossover::Bullish)
    } else if previous > current && signal > current {
        Some(MacdCrossover::Bearish)
    } else {
        None
    }
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate Bollinger Bands using ta crate
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> BandOutput {
    if values.is_empty() || period == 0 {
        return (vec![], vec![], vec![]);
    }

    let mut indicator = match TaBB::new(period, num_std) {
        Ok(i) => i,
        Err(_) => {
            return (
                vec![None; values.len()],
                vec![None; values.len()],
                vec![None; values.len()],
            )
        }
    };

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for (i, &value) in values.iter().enumerate() {
        let bb = indicator.next(value);
        if i + 1 >= period {
            upper.push(Some(bb.upper));
            middle.push(Some(bb.average));
            lower.push(Some(bb.lower));
        } else {
            upper.push(None);
            middle.push(None);
            lower.push(None);
        }
    }

    (upper, middle, lower)
}

// =============================================================================
// Trend Indicators
// =============================================================================

/// Calculate Wilder's Parabolic SAR.
///
/// The acceleration factor starts at `step`, grows by `step` each time the
/// extreme point extends and is capped at `max_step`. On a reversal the SAR
/// jumps to the prior extreme point and the factor resets. While trending,
/// the SAR never enters the previous two bars' range.
pub fn parabolic_sar(high: &[f64], low: &[f64], step: f64, max_step: f64) -> Vec<f64> {
    let n = high.len().min(low.len());
    if n == 0 || step <= 0.0 || max_step < step {
        return vec![];
    }

    let mut uptrend = n < 2 || high[1] + low[1] >= high[0] + low[0];
    let mut extreme = if uptrend { high[0] } else { low[0] };
    let mut af = step;

    let mut sar = Vec::with_capacity(n);
    sar.push(if uptrend { low[0] } else { high[0] });

    for i in 1..n {
        let prev = sar[i - 1];
        let mut value = prev + af * (extreme - prev);

        if uptrend {
            value = value.min(low[i - 1]);
            if i >= 2 {
                value = value.min(low[i - 2]);
            }

            if low[i] < value {
                uptrend = false;
                value = extreme.max(high[i]);
                extreme = low[i];
                af = step;
            } else if high[i] > extreme {
                extreme = high[i];
                af = (af + step).min(max_step);
            }
        } else {
            value = value.max(high[i - 1]);
            if i >= 2 {
                value = value.max(high[i - 2]);
            }

            if high[i] > value {
                uptrend = true;
                value = extreme.min(low[i]);
                extreme = high[i];
                af = step;
            } else if low[i] < extreme {
                extreme = low[i];
                af = (af + step).min(max_step);
            }
        }

        sar.push(value);
    }

    sar
}

// =============================================================================
// Tests
// =============================================================================
