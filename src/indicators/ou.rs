//! Ornstein-Uhlenbeck mean-reversion estimate
//!
//! The OU process `dX = θ(μ − X)dt + σ dW` sampled once per bar is an AR(1)
//! model `x_t = a + b·x_{t-1} + ε`, so an OLS fit on lagged prices gives
//!
//! - `θ = −ln b`
//! - `μ = a / (1 − b)`
//! - `σ = std(ε) / √(1 − b²)`
//! - half-life `= −ln 2 / ln b` bars
//!
//! Only `0 < b < 1` describes a mean-reverting window.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

/// Minimum window for the AR(1) fit
pub const MIN_SAMPLES: usize = 10;

/// Fitted OU parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OuParams {
    /// Long-run equilibrium level
    pub mu: f64,
    /// Mean-reversion speed per bar
    pub theta: f64,
    /// Stationary standard deviation
    pub sigma: f64,
    /// AR(1) coefficient, e^(−θ)
    pub b: f64,
    /// Bars for a deviation to halve
    pub half_life: f64,
}

impl OuParams {
    /// Fit the window. `None` when it is too short, flat, or not
    /// mean-reverting.
    pub fn estimate(prices: &[f64]) -> Option<Self> {
        let n = prices.len();
        if n < MIN_SAMPLES || prices.iter().any(|p| !p.is_finite()) {
            return None;
        }

        let x = &prices[..n - 1];
        let y = &prices[1..];
        let x_mean = x.mean();
        let y_mean = y.mean();

        let (num, den) = x
            .iter()
            .zip(y)
            .fold((0.0, 0.0), |(num, den), (xi, yi)| {
                (num + (xi - x_mean) * (yi - y_mean), den + (xi - x_mean).powi(2))
            });

        if den.abs() < 1e-12 {
            return None;
        }

        let b = num / den;
        if b <= 0.0 || b >= 1.0 {
            return None;
        }
        let a = y_mean - b * x_mean;

        let residuals: Vec<f64> = x.iter().zip(y).map(|(xi, yi)| yi - (a + b * xi)).collect();
        let sigma_eps = residuals.std_dev();

        let denom = (1.0 - b * b).sqrt();
        if denom < 1e-10 || !sigma_eps.is_finite() {
            return None;
        }

        Some(OuParams {
            mu: a / (1.0 - b),
            theta: -b.ln(),
            sigma: sigma_eps / denom,
            b,
            half_life: -std::f64::consts::LN_2 / b.ln(),
        })
    }

    /// Expected price `steps` bars after `last`
    pub fn predict(&self, last: f64, steps: u32) -> f64 {
        self.mu + (last - self.mu) * self.b.powi(steps as i32)
    }

    /// Distance from equilibrium in stationary standard deviations
    pub fn z_score(&self, price: f64) -> f64 {
        if self.sigma < 1e-12 {
            0.0
        } else {
            (price - self.mu) / self.sigma
        }
    }

    /// Probability the price moves further from equilibrium, `1 − Φ(|z|)`
    pub fn continuation_probability(&self, price: f64) -> Option<f64> {
        let normal = Normal::new(0.0, 1.0).ok()?;
        Some(1.0 - normal.cdf(self.z_score(price).abs()))
    }
}
