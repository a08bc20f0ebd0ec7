use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrnsteinUhlenbeckConfig {
    /// Closes used for the AR(1) fit (default: 100)
    pub window: usize,
    /// Entry distance in stationary standard deviations (default: 2.0)
    pub entry_z: f64,
    /// Require the one-bar OU prediction to point the same way (default: true)
    pub require_prediction: bool,
    /// Skip fits whose half-life exceeds this many bars (default: none)
    pub max_half_life: Option<f64>,
}

impl Default for OrnsteinUhlenbeckConfig {
    fn default() -> Self {
        OrnsteinUhlenbeckConfig {
            window: 100,
            entry_z: 2.0,
            require_prediction: true,
            max_half_life: None,
        }
    }
}
