//! Trading loop
//!
//! One cycle polls the latest window, validates it, asks the strategy for a
//! decision, drops a repeat of the last ordered side, sizes the order and
//! sends it. [`Trader::run`] repeats cycles on a fixed interval until the
//! order budget, the balance or the feed runs out, or shutdown is signalled.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::data::{closes, validate_prices};
use crate::exchange::{Exchange, ExchangeError};
use crate::sizing::{plan_order, Holdings, OrderLimits, OrderPlan, Sizing};
use crate::strategies::Strategy;
use crate::{Config, Market, Order, Side};

/// What a single cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Data or balances unavailable; try again next cycle
    Skipped(String),
    Hold,
    /// Same side as the last order; not repeated
    Duplicate(Side),
    BelowMinimum { side: Side, notional: f64 },
    Ordered(Order),
    /// Nothing more to do; the loop stops
    Halted(String),
}

/// Loop parameters taken from the config
#[derive(Debug, Clone)]
pub struct TraderSettings {
    pub market: Market,
    pub timeframe: String,
    pub candle_limit: usize,
    pub sizing: Sizing,
    pub limits: OrderLimits,
    pub max_orders: Option<usize>,
}

impl TraderSettings {
    pub fn from_config(config: &Config) -> Self {
        TraderSettings {
            market: config.market(),
            timeframe: config.trading.timeframe.clone(),
            candle_limit: config.trading.candle_limit,
            sizing: config.trading.sizing.clone(),
            limits: OrderLimits {
                min_notional: config.exchange.min_notional,
                cost_buffer: (1.0 + config.exchange.taker_fee) * (1.0 + config.exchange.slippage)
                    - 1.0,
            },
            max_orders: config.trading.max_orders,
        }
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraderSummary {
    pub cycles: u64,
    pub orders: usize,
    pub halt_reason: Option<String>,
}

pub struct Trader<E: Exchange> {
    exchange: E,
    strategy: Box<dyn Strategy>,
    settings: TraderSettings,
    /// Side of the last order sent; the only state carried between cycles
    last_side: Option<Side>,
    orders: usize,
    cycles: u64,
}

impl<E: Exchange> Trader<E> {
    pub fn new(exchange: E, mut strategy: Box<dyn Strategy>, settings: TraderSettings) -> Self {
        strategy.init();
        Trader {
            exchange,
            strategy,
            settings,
            last_side: None,
            orders: 0,
            cycles: 0,
        }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn last_side(&self) -> Option<Side> {
        self.last_side
    }

    pub fn orders(&self) -> usize {
        self.orders
    }

    fn budget_used(&self) -> Option<String> {
        self.settings
            .max_orders
            .filter(|max| self.orders >= *max)
            .map(|max| format!("order budget of {} used", max))
    }

    async fn holdings(&self) -> Result<Holdings, ExchangeError> {
        let base = self.exchange.fetch_balance(&self.settings.market.base).await?;
        let quote = self.exchange.fetch_balance(&self.settings.market.quote).await?;
        Ok(Holdings {
            quote: quote.free,
            base: base.free,
        })
    }

    /// Run one poll, compute, decide, order pass
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        debug!("--- Trading cycle {} ---", self.cycles);

        if let Some(reason) = self.budget_used() {
            return CycleOutcome::Halted(reason);
        }

        let symbol = self.settings.market.symbol();
        let candles = match self
            .exchange
            .fetch_candles(&symbol, &self.settings.timeframe, self.settings.candle_limit)
            .await
        {
            Ok(c) => c,
            Err(ExchangeError::FeedExhausted) => {
                return CycleOutcome::Halted("candle feed exhausted".to_string())
            }
            Err(e) => {
                warn!("Failed to fetch candles for {}: {}", symbol, e);
                return CycleOutcome::Skipped(e.to_string());
            }
        };

        if let Err(e) = validate_prices(&closes(&candles)) {
            warn!("Rejecting {} window of {} candles: {}", symbol, candles.len(), e);
            return CycleOutcome::Skipped(e.to_string());
        }

        let evaluation = self.strategy.evaluate(&candles);
        info!(
            "{} {} @ {:.2} -> {:?} {}",
            self.strategy.name(),
            symbol,
            evaluation.price,
            evaluation.signal,
            evaluation.describe()
        );

        let Some(side) = evaluation.signal.side() else {
            return CycleOutcome::Hold;
        };

        if self.last_side == Some(side) {
            debug!("{} signal repeats the last order, skipping", side);
            return CycleOutcome::Duplicate(side);
        }

        let holdings = match self.holdings().await {
            Ok(h) => h,
            Err(e) => {
                warn!("Failed to fetch balances: {}", e);
                return CycleOutcome::Skipped(e.to_string());
            }
        };

        let quantity = match plan_order(
            &self.settings.sizing,
            side,
            evaluation.price,
            holdings,
            &self.settings.limits,
        ) {
            OrderPlan::Place { quantity, .. } => quantity,
            OrderPlan::BelowMinimum { notional } => {
                info!(
                    "{} order of {:.2} {} is below the minimum of {:.2}, skipping",
                    side, notional, self.settings.market.quote, self.settings.limits.min_notional
                );
                return CycleOutcome::BelowMinimum { side, notional };
            }
            OrderPlan::Halt { reason } => {
                warn!("Halting: {}", reason);
                return CycleOutcome::Halted(reason);
            }
        };

        match self.exchange.market_order(&symbol, side, quantity).await {
            Ok(order) => {
                info!(
                    "Order {} filled: {} {:.8} {} @ {:.2} (fee {:.4})",
                    order.id, order.side, order.quantity, self.settings.market.base, order.price,
                    order.fee
                );
                self.last_side = Some(side);
                self.orders += 1;
                self.strategy.on_fill(&order);
                CycleOutcome::Ordered(order)
            }
            Err(ExchangeError::FeedExhausted) => {
                CycleOutcome::Halted("candle feed exhausted".to_string())
            }
            Err(e) => {
                error!("{} order for {} failed: {}", side, symbol, e);
                CycleOutcome::Skipped(e.to_string())
            }
        }
    }

    /// Run cycles every `every` until halted, `max_cycles` is reached or
    /// `shutdown` fires (or its sender is dropped)
    pub async fn run(
        &mut self,
        every: Duration,
        max_cycles: Option<u64>,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<TraderSummary> {
        if every.is_zero() {
            anyhow::bail!("Cycle interval must be greater than zero");
        }
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = TraderSummary::default();

        info!(
            "Starting trading loop: {} on {} {} every {:?}",
            self.strategy.name(),
            self.exchange.name(),
            self.settings.market,
            every
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let CycleOutcome::Halted(reason) = self.run_cycle().await {
                        info!("Trading halted: {}", reason);
                        summary.halt_reason = Some(reason);
                        break;
                    }
                    // stop right after the last allowed fill
                    if let Some(reason) = self.budget_used() {
                        info!("Trading halted: {}", reason);
                        summary.halt_reason = Some(reason);
                        break;
                    }
                    if max_cycles.is_some_and(|max| self.cycles >= max) {
                        info!("Reached {} cycles", self.cycles);
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        summary.cycles = self.cycles;
        summary.orders = self.orders;
        info!(
            "Trading loop ended after {} cycles and {} orders",
            summary.cycles, summary.orders
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{PaperAccount, PaperExchange};
    use crate::strategies::{Evaluation, Strategy};
    use crate::{Candle, Signal};
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits a fixed sequence of signals, one per evaluation
    struct Scripted {
        signals: Vec<Signal>,
        next: AtomicUsize,
        fills: Arc<AtomicUsize>,
    }

    impl Strategy for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn warmup(&self) -> usize {
            1
        }

        fn evaluate(&self, candles: &[Candle]) -> Evaluation {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            let signal = self.signals.get(i).copied().unwrap_or(Signal::Hold);
            Evaluation::new(signal, candles.last().map(|c| c.close).unwrap_or(0.0))
        }

        fn on_fill(&mut self, _order: &Order) {
            self.fills.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn history(n: usize) -> Vec<Candle> {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        (0..n)
            .map(|i| {
                Candle::new_unchecked(
                    start + ChronoDuration::minutes(5 * i as i64),
                    100.0,
                    101.0,
                    99.0,
                    100.0,
                    1.0,
                )
            })
            .collect()
    }

    fn settings(sizing: Sizing, max_orders: Option<usize>) -> TraderSettings {
        TraderSettings {
            market: Market::new("BTC", "USDT"),
            timeframe: "5m".to_string(),
            candle_limit: 3,
            sizing,
            limits: OrderLimits {
                min_notional: 10.0,
                cost_buffer: 0.0,
            },
            max_orders,
        }
    }

    fn trader(
        signals: Vec<Signal>,
        sizing: Sizing,
        max_orders: Option<usize>,
    ) -> (Trader<PaperExchange>, Arc<AtomicUsize>) {
        let fills = Arc::new(AtomicUsize::new(0));
        let strategy = Scripted {
            signals,
            next: AtomicUsize::new(0),
            fills: fills.clone(),
        };
        let account = PaperAccount::new(Market::new("BTC", "USDT"), 1_000.0, 0.0);
        let exchange = PaperExchange::new(history(20), account);
        (
            Trader::new(exchange, Box::new(strategy), settings(sizing, max_orders)),
            fills,
        )
    }

    #[tokio::test]
    async fn test_duplicate_side_is_not_repeated() {
        let (mut trader, fills) = trader(
            vec![Signal::Buy, Signal::Buy, Signal::Hold, Signal::Sell, Signal::Sell],
            Sizing::RiskFraction { fraction: 0.5 },
            None,
        );

        assert!(matches!(trader.run_cycle().await, CycleOutcome::Ordered(_)));
        assert_eq!(
            trader.run_cycle().await,
            CycleOutcome::Duplicate(Side::Buy)
        );
        assert_eq!(trader.run_cycle().await, CycleOutcome::Hold);
        assert!(matches!(trader.run_cycle().await, CycleOutcome::Ordered(_)));
        assert_eq!(
            trader.run_cycle().await,
            CycleOutcome::Duplicate(Side::Sell)
        );

        assert_eq!(trader.orders(), 2);
        assert_eq!(trader.last_side(), Some(Side::Sell));
        assert_eq!(fills.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sell_without_holdings_is_below_minimum() {
        let (mut trader, _) = trader(
            vec![Signal::Sell],
            Sizing::RiskFraction { fraction: 0.05 },
            None,
        );
        assert!(matches!(
            trader.run_cycle().await,
            CycleOutcome::BelowMinimum { side: Side::Sell, .. }
        ));
        assert_eq!(trader.last_side(), None);
    }

    #[tokio::test]
    async fn test_reserve_buys_once_then_halts() {
        let (mut trader, _) = trader(
            vec![Signal::Buy; 5],
            Sizing::Reserve {
                minimum_balance: 200.0,
            },
            Some(1),
        );

        match trader.run_cycle().await {
            CycleOutcome::Ordered(order) => {
                assert!((order.notional() - 800.0).abs() < 1e-6);
            }
            other => panic!("expected an order, got {:?}", other),
        }
        assert!(matches!(trader.run_cycle().await, CycleOutcome::Halted(_)));

        let account = trader.exchange().account().await;
        assert!((account.quote() - 200.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_reserve_exhausted_halts() {
        let (mut trader, _) = trader(
            vec![Signal::Buy],
            Sizing::Reserve {
                minimum_balance: 5_000.0,
            },
            None,
        );
        assert!(matches!(trader.run_cycle().await, CycleOutcome::Halted(_)));
    }

    #[tokio::test]
    async fn test_run_stops_when_feed_is_exhausted() {
        let (mut trader, _) = trader(vec![], Sizing::default(), None);
        let (_tx, rx) = mpsc::channel(1);

        let summary = trader
            .run(Duration::from_millis(1), None, rx)
            .await
            .unwrap();

        // 18 polls reveal bars 3..=20, the 19th finds the feed empty
        assert_eq!(summary.cycles, 19);
        assert_eq!(summary.orders, 0);
        assert_eq!(
            summary.halt_reason.as_deref(),
            Some("candle feed exhausted")
        );
    }

    #[tokio::test]
    async fn test_run_respects_max_cycles_and_shutdown() {
        let (mut trader, _) = trader(vec![], Sizing::default(), None);
        let (_tx, rx) = mpsc::channel(1);
        let summary = trader
            .run(Duration::from_millis(1), Some(4), rx)
            .await
            .unwrap();
        assert_eq!(summary.cycles, 4);

        let (tx, rx) = mpsc::channel(1);
        tx.send(()).await.unwrap();
        let summary = trader
            .run(Duration::from_secs(3600), None, rx)
            .await
            .unwrap();
        assert!(summary.halt_reason.is_none());
    }

    #[tokio::test]
    async fn test_run_halts_right_after_last_allowed_order() {
        let (mut trader, _) = trader(
            vec![Signal::Buy],
            Sizing::RiskFraction { fraction: 0.5 },
            Some(1),
        );
        let (_tx, rx) = mpsc::channel(1);

        // a second tick would be an hour away
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            trader.run(Duration::from_secs(3600), None, rx),
        )
        .await
        .expect("loop waited for another tick")
        .unwrap();

        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.orders, 1);
        assert_eq!(
            summary.halt_reason.as_deref(),
            Some("order budget of 1 used")
        );
    }

    #[tokio::test]
    async fn test_run_rejects_zero_interval() {
        let (mut trader, _) = trader(vec![], Sizing::default(), None);
        let (_tx, rx) = mpsc::channel(1);

        let err = trader.run(Duration::ZERO, None, rx).await.unwrap_err();
        assert!(err.to_string().contains("interval"));
        assert_eq!(trader.orders(), 0);
    }
}
