//! Order sizing
//!
//! Turns an actionable signal plus the current balances into a market order
//! quantity. Shared by the live loop and the backtest so both gate orders
//! identically.

use serde::{Deserialize, Serialize};

use crate::Side;

/// How much of the account each order commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Sizing {
    /// Buy with a fraction of free quote; sell the same fraction of equity
    RiskFraction { fraction: f64 },
    /// Buy with everything above a quote floor; sell the whole base balance
    Reserve { minimum_balance: f64 },
}

impl Default for Sizing {
    fn default() -> Self {
        Sizing::RiskFraction { fraction: 0.05 }
    }
}

/// Free balances of the traded pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holdings {
    pub quote: f64,
    pub base: f64,
}

impl Holdings {
    pub fn equity(&self, price: f64) -> f64 {
        self.quote + self.base * price
    }
}

/// Exchange constraints applied when sizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLimits {
    pub min_notional: f64,
    /// Fee plus slippage, kept aside from the quote spent on a buy
    pub cost_buffer: f64,
}

/// Outcome of sizing one signal
#[derive(Debug, Clone, PartialEq)]
pub enum OrderPlan {
    Place { side: Side, quantity: f64 },
    /// Order value under the exchange minimum; skip this cycle
    BelowMinimum { notional: f64 },
    /// Nothing left to trade with; stop the loop
    Halt { reason: String },
}

/// Size a market order for `side` at `price`
pub fn plan_order(
    sizing: &Sizing,
    side: Side,
    price: f64,
    holdings: Holdings,
    limits: &OrderLimits,
) -> OrderPlan {
    if !price.is_finite() || price <= 0.0 {
        return OrderPlan::BelowMinimum { notional: 0.0 };
    }

    let quantity = match (sizing, side) {
        (Sizing::RiskFraction { fraction }, Side::Buy) => {
            let spend = holdings.quote * fraction;
            spend / (price * (1.0 + limits.cost_buffer))
        }
        (Sizing::RiskFraction { fraction }, Side::Sell) => {
            let wanted = holdings.equity(price) * fraction / price;
            wanted.min(holdings.base)
        }
        (Sizing::Reserve { minimum_balance }, Side::Buy) => {
            let investable = holdings.quote - minimum_balance;
            if investable <= 0.0 {
                return OrderPlan::Halt {
                    reason: format!(
                        "free quote {:.2} is at or below the reserve {:.2}",
                        holdings.quote, minimum_balance
                    ),
                };
            }
            investable / (price * (1.0 + limits.cost_buffer))
        }
        (Sizing::Reserve { .. }, Side::Sell) => holdings.base,
    };

    let notional = quantity.max(0.0) * price;
    if quantity <= 0.0 || notional < limits.min_notional {
        return OrderPlan::BelowMinimum { notional };
    }

    OrderPlan::Place { side, quantity }
}
