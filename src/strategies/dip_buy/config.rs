use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DipBuyConfig {
    /// Closes scanned for the recent high (default: 48)
    pub lookback: usize,
    /// Required drop below the recent high, as a fraction (default: 0.02)
    pub dip_pct: f64,
}

impl Default for DipBuyConfig {
    fn default() -> Self {
        DipBuyConfig {
            lookback: 48,
            dip_pct: 0.02,
        }
    }
}
