use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FourierConfig {
    /// Closes in the transform window (default: 128)
    pub window: usize,
    /// Strongest harmonics kept for the projection (default: 3)
    pub harmonics: usize,
    /// Bars ahead to project (default: 3)
    pub horizon: usize,
    /// Minimum projected return to act on (default: 0.005)
    pub threshold: f64,
    /// Remove the least-squares trend before the transform (default: true)
    pub detrend: bool,
}

impl Default for FourierConfig {
    fn default() -> Self {
        FourierConfig {
            window: 128,
            harmonics: 3,
            horizon: 3,
            threshold: 0.005,
            detrend: true,
        }
    }
}
