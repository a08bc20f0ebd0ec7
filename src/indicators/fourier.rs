//! Spectral decomposition of a price window
//!
//! A plain DFT over the (optionally detrended) window. Windows are a few
//! hundred bars, so the O(n²) transform is cheap enough per cycle.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Minimum window for a meaningful spectrum
pub const MIN_SAMPLES: usize = 4;

/// One harmonic of the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralComponent {
    /// Harmonic index k (cycles per window)
    pub harmonic: usize,
    /// Period in bars, n / k
    pub period: f64,
    pub amplitude: f64,
    /// Phase in radians at t = 0
    pub phase: f64,
}

impl SpectralComponent {
    /// Value of this harmonic at bar `t` of a window of length `n`
    pub fn value_at(&self, t: f64, n: usize) -> f64 {
        let omega = 2.0 * PI * self.harmonic as f64 / n as f64;
        self.amplitude * (omega * t + self.phase).cos()
    }
}

/// Level removed before the transform, evaluated at any bar index
#[derive(Debug, Clone, Copy)]
struct Baseline {
    intercept: f64,
    slope: f64,
}

impl Baseline {
    fn fit(values: &[f64], detrend: bool) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        if !detrend {
            return Baseline {
                intercept: mean,
                slope: 0.0,
            };
        }

        let t_mean = (n - 1.0) / 2.0;
        let (num, den) = values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (t, v)| {
                let dt = t as f64 - t_mean;
                (num + dt * (v - mean), den + dt * dt)
            });
        let slope = if den > 0.0 { num / den } else { 0.0 };

        Baseline {
            intercept: mean - slope * t_mean,
            slope,
        }
    }

    fn at(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }
}

fn is_usable(values: &[f64]) -> bool {
    values.len() >= MIN_SAMPLES && values.iter().all(|v| v.is_finite())
}

/// Harmonics 1..=(n-1)/2 of the window, in harmonic order.
///
/// Empty when the window is shorter than [`MIN_SAMPLES`] or holds a
/// non-finite value.
pub fn spectrum(values: &[f64], detrend: bool) -> Vec<SpectralComponent> {
    if !is_usable(values) {
        return vec![];
    }

    let n = values.len();
    let baseline = Baseline::fit(values, detrend);
    let residuals: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(t, v)| v - baseline.at(t as f64))
        .collect();

    (1..=(n - 1) / 2)
        .map(|k| {
            let (re, im) = residuals
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(re, im), (t, r)| {
                    let angle = 2.0 * PI * (k * t) as f64 / n as f64;
                    (re + r * angle.cos(), im - r * angle.sin())
                });

            SpectralComponent {
                harmonic: k,
                period: n as f64 / k as f64,
                amplitude: 2.0 * re.hypot(im) / n as f64,
                phase: im.atan2(re),
            }
        })
        .collect()
}

/// The `count` strongest harmonics, largest amplitude first
pub fn dominant_cycles(values: &[f64], count: usize, detrend: bool) -> Vec<SpectralComponent> {
    let mut components = spectrum(values, detrend);
    components.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
    components.truncate(count);
    components
}

/// Project the window `horizon` bars past its last sample using the
/// baseline plus the `harmonics` strongest cycles.
pub fn extrapolate(values: &[f64], harmonics: usize, horizon: usize, detrend: bool) -> Option<f64> {
    if !is_usable(values) {
        return None;
    }

    let n = values.len();
    let baseline = Baseline::fit(values, detrend);
    let t = (n - 1 + horizon) as f64;

    let cycles: f64 = dominant_cycles(values, harmonics, detrend)
        .iter()
        .map(|c| c.value_at(t, n))
        .sum();

    let projected = baseline.at(t) + cycles;
    projected.is_finite().then_some(projected)
}
