//! Exchange seam
//!
//! The trading loop talks to an exchange only through the [`Exchange`]
//! trait. A network client for a real venue lives outside this crate and
//! implements the trait; in-tree there is the paper exchange that replays
//! candle history and a guard that adds request spacing, retries and a
//! circuit breaker around any implementation.

pub mod guard;
pub mod paper;

pub use guard::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, GuardedExchange, RequestSpacer,
    RetryPolicy,
};
pub use paper::{PaperAccount, PaperExchange};

use async_trait::async_trait;
use thiserror::Error;

use crate::{Balance, Candle, Order, Side, Symbol};

/// Failures an exchange can report
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExchangeError {
    #[error("exchange unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited, retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("insufficient {asset}: need {needed:.8}, have {available:.8}")]
    InsufficientFunds {
        asset: String,
        needed: f64,
        available: f64,
    },

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("candle feed exhausted")]
    FeedExhausted,

    #[error("circuit breaker open, request rejected")]
    CircuitOpen,
}

impl ExchangeError {
    /// Failures worth retrying: the request itself was fine
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unavailable(_) | ExchangeError::RateLimited { .. }
        )
    }
}

/// Market data and order entry for one venue
#[async_trait]
pub trait Exchange: Send + Sync {
    fn name(&self) -> &str;

    /// Latest `limit` candles of `symbol`, oldest first
    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Last traded price
    async fn fetch_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError>;

    /// Balance of one asset; assets never held report zero
    async fn fetch_balance(&self, asset: &str) -> Result<Balance, ExchangeError>;

    /// Market order for `quantity` units of the base asset
    async fn market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
    ) -> Result<Order, ExchangeError>;
}
