//! Request guard for exchange clients
//!
//! [`GuardedExchange`] wraps any [`Exchange`] with:
//! - request spacing, so polls and orders never burst past the venue's limit
//! - retry with exponential backoff for transient read failures
//! - a circuit breaker that stops calling a venue that keeps failing
//!
//! Orders are sent once. A timed-out order may still have filled, so it is
//! never resent blindly.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use super::{Exchange, ExchangeError};
use crate::config::ExchangeConfig;
use crate::{Balance, Candle, Order, Side, Symbol};

// =============================================================================
// Circuit breaker
// =============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircuitState {
    /// Normal operation - requests pass through
    #[default]
    Closed,
    /// Venue is failing - requests are rejected immediately
    Open,
    /// Cooling-off period elapsed - probing whether the venue recovered
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Consecutive successes in HalfOpen before closing
    pub success_threshold: u32,
    /// Time spent Open before probing
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    config: CircuitBreakerConfig,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            config,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Whether a request may go out now; moves Open to HalfOpen once the
    /// timeout has passed
    pub fn can_attempt(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = self
                    .opened_at
                    .is_none_or(|at| at.elapsed() >= self.config.timeout);
                if cooled {
                    info!("Circuit breaker half-open, probing exchange");
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                }
                cooled
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => self.failure_count = 0,
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.config.success_threshold {
                    info!("Circuit breaker closed after successful recovery");
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker opened after {} failures",
                        self.failure_count
                    );
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                warn!("Circuit breaker re-opened, exchange still failing");
                self.open();
            }
            CircuitState::Open => self.opened_at = Some(Instant::now()),
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.failure_count = 0;
        self.success_count = 0;
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }
}

// =============================================================================
// Request spacing
// =============================================================================

/// Enforces a minimum gap between consecutive requests
#[derive(Debug)]
pub struct RequestSpacer {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next request slot, then reserve the one after it
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            if slot > Instant::now() {
                sleep_until(slot).await;
            }
        }
        *next_slot = Some(Instant::now() + self.min_interval);
    }
}

// =============================================================================
// Retry policy
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based): base, 2×base, 4×base, ...
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

// =============================================================================
// Guarded exchange
// =============================================================================

pub struct GuardedExchange<E> {
    inner: E,
    breaker: Mutex<CircuitBreaker>,
    spacer: RequestSpacer,
    retry: RetryPolicy,
}

impl<E: Exchange> GuardedExchange<E> {
    pub fn new(
        inner: E,
        breaker: CircuitBreakerConfig,
        spacing: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(breaker)),
            spacer: RequestSpacer::new(spacing),
            retry,
        }
    }

    /// Build the guard from the exchange section of the config
    pub fn from_config(inner: E, config: &ExchangeConfig) -> Self {
        Self::new(
            inner,
            CircuitBreakerConfig {
                failure_threshold: config.circuit_failure_threshold,
                timeout: Duration::from_secs(config.circuit_timeout_secs),
                ..CircuitBreakerConfig::default()
            },
            Duration::from_millis(config.min_request_interval_ms),
            RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
        )
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.lock().await.state()
    }

    async fn admit(&self) -> Result<(), ExchangeError> {
        if !self.breaker.lock().await.can_attempt() {
            return Err(ExchangeError::CircuitOpen);
        }
        self.spacer.acquire().await;
        Ok(())
    }

    async fn settle<T>(&self, result: &Result<T, ExchangeError>) {
        let mut breaker = self.breaker.lock().await;
        match result {
            Ok(_) => breaker.record_success(),
            Err(e) if e.is_transient() => breaker.record_failure(),
            // the venue answered; a rejected request is not an outage
            Err(_) => breaker.record_success(),
        }
    }

    /// Run a read with retries on transient failures
    async fn with_retry<T, F, Fut>(&self, what: &str, operation: F) -> Result<T, ExchangeError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        self.admit().await?;

        let mut attempt = 0;
        loop {
            let result = operation().await;
            match result {
                Err(ref e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {}ms",
                        what,
                        attempt,
                        self.retry.max_retries + 1,
                        e,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    self.spacer.acquire().await;
                }
                _ => {
                    self.settle(&result).await;
                    return result;
                }
            }
        }
    }
}

#[async_trait]
impl<E: Exchange> Exchange for GuardedExchange<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.with_retry("fetch_candles", || {
            self.inner.fetch_candles(symbol, timeframe, limit)
        })
        .await
    }

    async fn fetch_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        self.with_retry("fetch_price", || self.inner.fetch_price(symbol))
            .await
    }

    async fn fetch_balance(&self, asset: &str) -> Result<Balance, ExchangeError> {
        self.with_retry("fetch_balance", || self.inner.fetch_balance(asset))
            .await
    }

    async fn market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
    ) -> Result<Order, ExchangeError> {
        self.admit().await?;
        debug!("Sending {} {} qty={:.8}", side, symbol, quantity);
        let result = self.inner.market_order(symbol, side, quantity).await;
        self.settle(&result).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Exchange whose reads fail a set number of times before succeeding
    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
        error: ExchangeError,
    }

    impl Flaky {
        fn new(failures: u32, error: ExchangeError) -> Self {
            Flaky {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn step(&self) -> Result<(), ExchangeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Exchange for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn fetch_candles(
            &self,
            _symbol: &Symbol,
            _timeframe: &str,
            _limit: usize,
        ) -> Result<Vec<Candle>, ExchangeError> {
            self.step().map(|_| vec![])
        }

        async fn fetch_price(&self, _symbol: &Symbol) -> Result<f64, ExchangeError> {
            self.step().map(|_| 100.0)
        }

        async fn fetch_balance(&self, asset: &str) -> Result<Balance, ExchangeError> {
            self.step().map(|_| Balance::new(asset, 1.0))
        }

        async fn market_order(
            &self,
            _symbol: &Symbol,
            _side: Side,
            _quantity: f64,
        ) -> Result<Order, ExchangeError> {
            self.step()?;
            Err(ExchangeError::InvalidOrder("test venue".into()))
        }
    }

    fn guarded(inner: Flaky, failure_threshold: u32) -> GuardedExchange<Flaky> {
        GuardedExchange::new(
            inner,
            CircuitBreakerConfig {
                failure_threshold,
                success_threshold: 1,
                timeout: Duration::from_millis(20),
            },
            Duration::ZERO,
            RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    fn unavailable() -> ExchangeError {
        ExchangeError::Unavailable("503".into())
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_transient_read_is_retried() {
        let exchange = guarded(Flaky::new(2, unavailable()), 5);
        let price = exchange.fetch_price(&Symbol::new("BTCUSDT")).await;

        assert_eq!(price, Ok(100.0));
        assert_eq!(exchange.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(exchange.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let exchange = guarded(Flaky::new(5, ExchangeError::FeedExhausted), 5);
        let result = exchange.fetch_price(&Symbol::new("BTCUSDT")).await;

        assert_eq!(result, Err(ExchangeError::FeedExhausted));
        assert_eq!(exchange.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_orders_are_sent_once() {
        let exchange = guarded(Flaky::new(1, unavailable()), 5);
        let result = exchange
            .market_order(&Symbol::new("BTCUSDT"), Side::Buy, 1.0)
            .await;

        assert_eq!(result.err(), Some(unavailable()));
        assert_eq!(exchange.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_breaker_opens_and_recovers() {
        let exchange = guarded(Flaky::new(3, unavailable()), 1);
        let symbol = Symbol::new("BTCUSDT");

        // three attempts, all fail, breaker opens
        assert!(exchange.fetch_price(&symbol).await.is_err());
        assert_eq!(exchange.circuit_state().await, CircuitState::Open);
        assert_eq!(
            exchange.fetch_price(&symbol).await,
            Err(ExchangeError::CircuitOpen)
        );

        sleep(Duration::from_millis(30)).await;
        assert_eq!(exchange.fetch_price(&symbol).await, Ok(100.0));
        assert_eq!(exchange.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_spacer_enforces_gap() {
        let spacer = RequestSpacer::new(Duration::from_millis(20));
        let start = Instant::now();
        spacer.acquire().await;
        spacer.acquire().await;
        spacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let mut breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            timeout: Duration::ZERO,
        });

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.can_attempt());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
