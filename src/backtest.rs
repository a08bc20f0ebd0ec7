//! Backtesting engine
//!
//! Replays a candle history through the same decide-and-size path as the
//! live loop: each bar the strategy sees the trailing `candle_limit` window,
//! repeated sides are dropped, orders are sized by `plan_order` and filled
//! by a [`PaperAccount`] at the bar's close.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::data::load_csv;
use crate::exchange::PaperAccount;
use crate::sizing::{plan_order, Holdings, OrderPlan};
use crate::strategies::{create_strategy, Strategy};
use crate::trader::TraderSettings;
use crate::{Candle, Config, Order, Side};

/// Outcome of one replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct BacktestResult {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub return_pct: f64,
    pub max_drawdown_pct: f64,
    pub total_fees: f64,
    pub buys: usize,
    pub sells: usize,
    pub bars: usize,
    pub halt_reason: Option<String>,
    #[serde(skip)]
    pub orders: Vec<Order>,
    #[serde(skip)]
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
}

impl BacktestResult {
    pub fn total_orders(&self) -> usize {
        self.buys + self.sells
    }
}

/// Largest peak-to-trough fall of an equity series, in percent
pub fn max_drawdown_pct(equity: impl IntoIterator<Item = f64>) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst * 100.0
}

/// Backtest engine
pub struct Backtester {
    config: Config,
    strategy: Box<dyn Strategy>,
}

impl Backtester {
    pub fn new(config: Config, mut strategy: Box<dyn Strategy>) -> Self {
        strategy.init();
        Backtester { config, strategy }
    }

    /// Replay `candles` (oldest first)
    pub fn run(&mut self, candles: &[Candle]) -> BacktestResult {
        let settings = TraderSettings::from_config(&self.config);
        let mut account = PaperAccount::new(
            settings.market.clone(),
            self.config.paper.initial_quote,
            self.config.paper.initial_base,
        )
        .with_costs(self.config.exchange.taker_fee, self.config.exchange.slippage);

        let initial_equity = candles
            .first()
            .map(|c| account.equity(c.close))
            .unwrap_or(self.config.paper.initial_quote);
        let window = settings.candle_limit.max(1);
        let warmup = self.strategy.warmup();
        // first bar the live loop decides on: its first poll is a full window
        let first_bar = (window - 1).min(candles.len().saturating_sub(1));

        let mut last_side: Option<Side> = None;
        let mut orders: Vec<Order> = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len());
        let mut halt_reason: Option<String> = None;

        for (i, bar) in candles.iter().enumerate() {
            if halt_reason.is_none() && i >= first_bar && i + 1 >= warmup {
                let start = (i + 1).saturating_sub(window);
                let evaluation = self.strategy.evaluate(&candles[start..=i]);

                if let Some(side) = evaluation.signal.side().filter(|s| last_side != Some(*s)) {
                    let holdings = Holdings {
                        quote: account.quote(),
                        base: account.base(),
                    };
                    match plan_order(
                        &settings.sizing,
                        side,
                        evaluation.price,
                        holdings,
                        &settings.limits,
                    ) {
                        OrderPlan::Place { quantity, .. } => {
                            match account.execute(side, quantity, bar.close, bar.datetime) {
                                Ok(order) => {
                                    debug!(
                                        "{} {} {:.8} @ {:.2} [{}]",
                                        bar.datetime,
                                        side,
                                        order.quantity,
                                        order.price,
                                        evaluation.describe()
                                    );
                                    self.strategy.on_fill(&order);
                                    last_side = Some(side);
                                    orders.push(order);
                                }
                                Err(e) => warn!("{}: order rejected: {}", bar.datetime, e),
                            }
                        }
                        OrderPlan::BelowMinimum { .. } => {}
                        OrderPlan::Halt { reason } => halt_reason = Some(reason),
                    }
                }

                if settings.max_orders.is_some_and(|max| orders.len() >= max) {
                    halt_reason.get_or_insert_with(|| "order budget used".to_string());
                }
            }

            equity_curve.push((bar.datetime, account.equity(bar.close)));
        }

        let final_equity = equity_curve
            .last()
            .map(|(_, e)| *e)
            .unwrap_or(initial_equity);
        let return_pct = if initial_equity > 0.0 {
            (final_equity / initial_equity - 1.0) * 100.0
        } else {
            0.0
        };

        BacktestResult {
            initial_equity,
            final_equity,
            return_pct,
            max_drawdown_pct: max_drawdown_pct(equity_curve.iter().map(|(_, e)| *e)),
            total_fees: account.fees_paid(),
            buys: orders.iter().filter(|o| o.side == Side::Buy).count(),
            sells: orders.iter().filter(|o| o.side == Side::Sell).count(),
            bars: candles.len(),
            halt_reason,
            orders,
            equity_curve,
        }
    }
}

/// Load one CSV file and replay it with a fresh strategy
pub fn backtest_file(config: &Config, path: &Path) -> Result<BacktestResult> {
    let candles = load_csv(path)?;
    if candles.is_empty() {
        anyhow::bail!("No valid candles in {}", path.display());
    }
    let strategy = create_strategy(config)
        .with_context(|| format!("Failed to create strategy {}", config.strategy_name))?;
    Ok(Backtester::new(config.clone(), strategy).run(&candles))
}

/// Replay several files in parallel
pub fn backtest_files(
    config: &Config,
    files: &[PathBuf],
    progress: &ProgressBar,
) -> Vec<(PathBuf, Result<BacktestResult>)> {
    info!(
        "Backtesting {} on {} files",
        config.strategy_name,
        files.len()
    );

    files
        .par_iter()
        .map(|path| {
            let result = backtest_file(config, path);
            progress.inc(1);
            (path.clone(), result)
        })
        .collect()
}
