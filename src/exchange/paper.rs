//! Paper trading
//!
//! [`PaperAccount`] is the synchronous fill engine shared with the backtest:
//! market orders fill at the reference price moved against the trader by the
//! slippage rate, and the taker fee is charged in the quote asset.
//! [`PaperExchange`] wraps an account and a candle history behind the
//! [`Exchange`] trait so the live loop can run against recorded data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Exchange, ExchangeError};
use crate::{Balance, Candle, Market, Order, OrderStatus, Side, Symbol};

/// Tolerance for balance checks against float dust
const BALANCE_EPSILON: f64 = 1e-9;

/// In-memory balances of one market with a simple fill model
#[derive(Debug, Clone)]
pub struct PaperAccount {
    market: Market,
    base: f64,
    quote: f64,
    fee_rate: f64,
    slippage: f64,
    fees_paid: f64,
    orders: usize,
}

impl PaperAccount {
    pub fn new(market: Market, initial_quote: f64, initial_base: f64) -> Self {
        PaperAccount {
            market,
            base: initial_base,
            quote: initial_quote,
            fee_rate: 0.0,
            slippage: 0.0,
            fees_paid: 0.0,
            orders: 0,
        }
    }

    pub fn with_costs(mut self, fee_rate: f64, slippage: f64) -> Self {
        self.fee_rate = fee_rate;
        self.slippage = slippage;
        self
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn quote(&self) -> f64 {
        self.quote
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    /// Fee plus slippage as a fraction of order value
    pub fn cost_rate(&self) -> f64 {
        self.fee_rate + self.slippage
    }

    /// Mark-to-market value in quote currency
    pub fn equity(&self, price: f64) -> f64 {
        self.quote + self.base * price
    }

    /// Balance of `asset`; assets outside the market report zero
    pub fn balance(&self, asset: &str) -> Balance {
        let free = if asset.eq_ignore_ascii_case(&self.market.base) {
            self.base
        } else if asset.eq_ignore_ascii_case(&self.market.quote) {
            self.quote
        } else {
            0.0
        };
        Balance::new(asset.to_uppercase(), free)
    }

    /// Fill a market order at `price`
    pub fn execute(
        &mut self,
        side: Side,
        quantity: f64,
        price: f64,
        time: DateTime<Utc>,
    ) -> Result<Order, ExchangeError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ExchangeError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(ExchangeError::InvalidOrder(format!(
                "price must be positive, got {}",
                price
            )));
        }

        let fill_price = match side {
            Side::Buy => price * (1.0 + self.slippage),
            Side::Sell => price * (1.0 - self.slippage),
        };
        let notional = quantity * fill_price;
        let fee = notional * self.fee_rate;

        match side {
            Side::Buy => {
                let cost = notional + fee;
                if cost - self.quote > BALANCE_EPSILON * self.quote.max(1.0) {
                    return Err(ExchangeError::InsufficientFunds {
                        asset: self.market.quote.clone(),
                        needed: cost,
                        available: self.quote,
                    });
                }
                self.quote = (self.quote - cost).max(0.0);
                self.base += quantity;
            }
            Side::Sell => {
                if quantity - self.base > BALANCE_EPSILON * self.base.max(1.0) {
                    return Err(ExchangeError::InsufficientFunds {
                        asset: self.market.base.clone(),
                        needed: quantity,
                        available: self.base,
                    });
                }
                self.base = (self.base - quantity).max(0.0);
                self.quote += notional - fee;
            }
        }

        self.fees_paid += fee;
        self.orders += 1;

        Ok(Order {
            id: format!("paper-{}", self.orders),
            symbol: self.market.symbol(),
            side,
            quantity,
            price: fill_price,
            fee,
            status: OrderStatus::Filled,
            created_time: time,
        })
    }
}

#[derive(Debug)]
struct ReplayState {
    account: PaperAccount,
    /// Index of the bar the next poll reveals
    next_bar: Option<usize>,
}

impl ReplayState {
    fn current_bar(&self) -> usize {
        self.next_bar.map(|n| n.saturating_sub(1)).unwrap_or(0)
    }
}

/// [`Exchange`] that replays a candle history, one new bar per poll
#[derive(Debug)]
pub struct PaperExchange {
    history: Vec<Candle>,
    state: Mutex<ReplayState>,
}

impl PaperExchange {
    pub fn new(history: Vec<Candle>, account: PaperAccount) -> Self {
        PaperExchange {
            history,
            state: Mutex::new(ReplayState {
                account,
                next_bar: None,
            }),
        }
    }

    /// Snapshot of the account, e.g. for a final report
    pub async fn account(&self) -> PaperAccount {
        self.state.lock().await.account.clone()
    }

    /// Close of the bar most recently revealed
    pub async fn last_price(&self) -> Option<f64> {
        let state = self.state.lock().await;
        self.history.get(state.current_bar()).map(|c| c.close)
    }

    fn check_symbol(&self, account: &PaperAccount, symbol: &Symbol) -> Result<(), ExchangeError> {
        if account.market().symbol() == *symbol {
            Ok(())
        } else {
            Err(ExchangeError::UnknownSymbol(symbol.to_string()))
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let mut state = self.state.lock().await;
        self.check_symbol(&state.account, symbol)?;

        let limit = limit.max(1);
        // the first poll already shows a full window
        let bar = state
            .next_bar
            .unwrap_or_else(|| (limit - 1).min(self.history.len().saturating_sub(1)));
        if bar >= self.history.len() {
            return Err(ExchangeError::FeedExhausted);
        }
        state.next_bar = Some(bar + 1);

        let start = (bar + 1).saturating_sub(limit);
        debug!(
            "Replaying {} {} bar {}/{} ({} candles)",
            symbol,
            timeframe,
            bar + 1,
            self.history.len(),
            bar + 1 - start
        );
        Ok(self.history[start..=bar].to_vec())
    }

    async fn fetch_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        let state = self.state.lock().await;
        self.check_symbol(&state.account, symbol)?;
        self.history
            .get(state.current_bar())
            .map(|c| c.close)
            .ok_or(ExchangeError::FeedExhausted)
    }

    async fn fetch_balance(&self, asset: &str) -> Result<Balance, ExchangeError> {
        Ok(self.state.lock().await.account.balance(asset))
    }

    async fn market_order(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
    ) -> Result<Order, ExchangeError> {
        let mut state = self.state.lock().await;
        self.check_symbol(&state.account, symbol)?;

        let candle = self
            .history
            .get(state.current_bar())
            .ok_or(ExchangeError::FeedExhausted)?;
        let (price, time) = (candle.close, candle.datetime);

        let order = state.account.execute(side, quantity, price, time)?;
        info!(
            "[PAPER] {} {} qty={:.6} @ {:.2} fee={:.4}",
            order.side, symbol, order.quantity, order.price, order.fee
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn market() -> Market {
        Market::new("BTC", "USDT")
    }

    fn history(n: usize) -> Vec<Candle> {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new_unchecked(
                    start + Duration::minutes(5 * i as i64),
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_buy_applies_slippage_and_fee() {
        let mut account = PaperAccount::new(market(), 1_000.0, 0.0).with_costs(0.001, 0.01);
        let order = account.execute(Side::Buy, 1.0, 100.0, Utc::now()).unwrap();

        assert_relative_eq!(order.price, 101.0, epsilon = 1e-9);
        assert_relative_eq!(order.fee, 0.101, epsilon = 1e-9);
        assert_relative_eq!(account.quote(), 1_000.0 - 101.0 - 0.101, epsilon = 1e-9);
        assert_relative_eq!(account.base(), 1.0);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn test_sell_credits_quote_minus_fee() {
        let mut account = PaperAccount::new(market(), 0.0, 2.0).with_costs(0.001, 0.0);
        account.execute(Side::Sell, 2.0, 50.0, Utc::now()).unwrap();

        assert_relative_eq!(account.quote(), 100.0 - 0.1, epsilon = 1e-9);
        assert_eq!(account.base(), 0.0);
        assert_relative_eq!(account.fees_paid(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_unfunded_orders() {
        let mut account = PaperAccount::new(market(), 50.0, 0.0);
        assert!(matches!(
            account.execute(Side::Buy, 1.0, 100.0, Utc::now()),
            Err(ExchangeError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            account.execute(Side::Sell, 0.1, 100.0, Utc::now()),
            Err(ExchangeError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            account.execute(Side::Buy, 0.0, 100.0, Utc::now()),
            Err(ExchangeError::InvalidOrder(_))
        ));
        assert_eq!(account.quote(), 50.0);
    }

    #[test]
    fn test_balance_lookup() {
        let account = PaperAccount::new(market(), 10.0, 0.5);
        assert_eq!(account.balance("usdt").free, 10.0);
        assert_eq!(account.balance("BTC").free, 0.5);
        assert_eq!(account.balance("ETH").free, 0.0);
        assert_relative_eq!(account.equity(100.0), 60.0);
    }

    #[tokio::test]
    async fn test_replay_advances_one_bar_per_poll() {
        let exchange = PaperExchange::new(history(5), PaperAccount::new(market(), 100.0, 0.0));
        let symbol = market().symbol();

        let first = exchange.fetch_candles(&symbol, "5m", 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.last().unwrap().close, 102.0);

        let second = exchange.fetch_candles(&symbol, "5m", 3).await.unwrap();
        assert_eq!(second.first().unwrap().close, 101.0);
        assert_eq!(second.last().unwrap().close, 103.0);
        assert_eq!(exchange.fetch_price(&symbol).await.unwrap(), 103.0);

        exchange.fetch_candles(&symbol, "5m", 3).await.unwrap();
        assert_eq!(
            exchange.fetch_candles(&symbol, "5m", 3).await,
            Err(ExchangeError::FeedExhausted)
        );
    }

    #[tokio::test]
    async fn test_orders_fill_at_current_bar() {
        let exchange = PaperExchange::new(history(5), PaperAccount::new(market(), 1_000.0, 0.0));
        let symbol = market().symbol();

        exchange.fetch_candles(&symbol, "5m", 2).await.unwrap();
        let order = exchange.market_order(&symbol, Side::Buy, 2.0).await.unwrap();
        assert_eq!(order.price, 101.0);

        let balance = exchange.fetch_balance("BTC").await.unwrap();
        assert_eq!(balance.free, 2.0);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let exchange = PaperExchange::new(history(5), PaperAccount::new(market(), 1.0, 0.0));
        let result = exchange.fetch_candles(&Symbol::new("ETHUSDT"), "5m", 2).await;
        assert!(matches!(result, Err(ExchangeError::UnknownSymbol(_))));
    }
}
