//! Signal Trader
//!
//! Poll-compute-decide-order trading bot for a single spot market. Each
//! cycle fetches recent candles, runs one indicator strategy (RSI, Bollinger
//! Bands, Parabolic SAR, MACD crossover, Fourier cycles or an
//! Ornstein-Uhlenbeck fit), sizes an order from the account balances and
//! submits it. The same decision path drives the backtester.

pub mod backtest;
pub mod config;
pub mod data;
pub mod exchange;
pub mod indicators;
pub mod sizing;
pub mod strategies;
pub mod trader;
pub mod types;

pub use config::Config;
pub use strategies::{Evaluation, Strategy};
pub use types::*;
