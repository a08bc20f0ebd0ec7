//! Configuration management
//!
//! Loads the JSON configuration file and applies environment overrides for
//! the traded market and the polling interval.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::sizing::Sizing;
use crate::{Market, Symbol};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default = "default_strategy_name")]
    pub strategy_name: String,
    /// Strategy parameters, deserialised by the selected strategy
    #[serde(default = "empty_object")]
    pub strategy: serde_json::Value,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

fn default_strategy_name() -> String {
    "sar_macd_rsi".to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

impl Config {
    /// Load configuration from JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the trading loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.trading.interval_secs == 0 {
            anyhow::bail!("trading.interval_secs must be greater than zero");
        }
        if self.trading.candle_limit == 0 {
            anyhow::bail!("trading.candle_limit must be greater than zero");
        }
        Ok(())
    }

    /// Override market and interval from `TRADER_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(base) = std::env::var("TRADER_SYMBOL_BASE") {
            info!("Base asset overridden from environment: {}", base);
            self.trading.base = base.to_uppercase();
        }
        if let Ok(quote) = std::env::var("TRADER_SYMBOL_QUOTE") {
            info!("Quote asset overridden from environment: {}", quote);
            self.trading.quote = quote.to_uppercase();
        }
        if let Ok(secs) = std::env::var("TRADER_INTERVAL_SECS") {
            self.trading.interval_secs = secs
                .parse()
                .with_context(|| format!("Invalid TRADER_INTERVAL_SECS: {}", secs))?;
        }
        Ok(())
    }

    pub fn market(&self) -> Market {
        Market::new(&self.trading.base, &self.trading.quote)
    }

    pub fn symbol(&self) -> Symbol {
        self.market().symbol()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            exchange: ExchangeConfig::default(),
            trading: TradingConfig::default(),
            strategy_name: default_strategy_name(),
            strategy: empty_object(),
            paper: PaperConfig::default(),
            backtest: BacktestConfig::default(),
        }
    }
}

/// Exchange fill model and request guard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub taker_fee: f64,
    pub slippage: f64,
    /// Smallest order value in quote currency
    pub min_notional: f64,
    /// Minimum spacing between requests
    pub min_request_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub circuit_failure_threshold: u32,
    pub circuit_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            taker_fee: 0.001, // 0.1%
            slippage: 0.0005,
            min_notional: 10.0,
            min_request_interval_ms: 100,
            max_retries: 3,
            retry_base_delay_ms: 500,
            circuit_failure_threshold: 5,
            circuit_timeout_secs: 60,
        }
    }
}

/// Trading loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub base: String,
    pub quote: String,
    pub timeframe: String,
    /// Candles fetched per cycle
    pub candle_limit: usize,
    pub interval_secs: u64,
    pub sizing: Sizing,
    /// Stop after this many orders
    pub max_orders: Option<usize>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            timeframe: "5m".to_string(),
            candle_limit: 500,
            interval_secs: 300,
            sizing: Sizing::default(),
            max_orders: None,
        }
    }
}

/// Starting balances of the paper exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_quote: f64,
    pub initial_base: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        PaperConfig {
            initial_quote: 10_000.0,
            initial_base: 0.0,
        }
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data_dir: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_dir: "data".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{
            "trading": { "base": "eth", "sizing": { "mode": "reserve", "minimum_balance": 50.0 } },
            "strategy_name": "dip_buy",
            "strategy": { "dip_pct": 0.03 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.strategy_name, "dip_buy");
        assert_eq!(config.trading.quote, "USDT");
        assert_eq!(config.trading.candle_limit, 500);
        assert_eq!(
            config.trading.sizing,
            Sizing::Reserve {
                minimum_balance: 50.0
            }
        );
        assert_eq!(config.symbol(), Symbol::new("ETHUSDT"));
        assert_eq!(config.exchange.taker_fee, 0.001);
    }

    #[test]
    fn test_default_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.strategy_name, "sar_macd_rsi");
        assert_eq!(parsed.trading.sizing, config.trading.sizing);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.trading.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_secs"));
    }

    #[test]
    fn test_from_file_rejects_zero_interval() {
        let path = std::env::temp_dir().join(format!(
            "signal_trader_zero_interval_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "trading": { "interval_secs": 0 } }"#).unwrap();

        let result = Config::from_file(&path);
        let _ = fs::remove_file(&path);
        assert!(result.is_err());
    }
}
