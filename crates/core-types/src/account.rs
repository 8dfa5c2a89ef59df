// In crates/core-types/src/account.rs

use crate::types::{PositionSide, TradingPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pair: TradingPair,
    pub side: PositionSide,
    /// Base-asset quantity, non-negative regardless of side.
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
    pub unrealized_pnl: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Position {
    /// Notional exposure at the mark price.
    pub fn notional(&self) -> Decimal {
        self.quantity.abs() * self.mark_price
    }
}

/// A closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHistory {
    pub pair: TradingPair,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub fee: Decimal,
    pub opened_at: i64,
    pub closed_at: i64,
}

/// Selection of closed positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub pair: Option<TradingPair>,
    /// Inclusive lower bound on close time.
    pub start: Option<i64>,
    /// Inclusive upper bound on close time.
    pub end: Option<i64>,
}

impl HistoryFilter {
    pub fn matches(&self, record: &PositionHistory) -> bool {
        self.pair.as_ref().is_none_or(|p| *p == record.pair)
            && self.start.is_none_or(|s| record.closed_at >= s)
            && self.end.is_none_or(|e| record.closed_at <= e)
    }
}

/// Snapshot of the account's balances in the quote asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub total_balance: Decimal,
    pub available_balance: Decimal,
    pub used_margin: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Acknowledgement of an order accepted by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRef {
    pub id: String,
    pub pair: TradingPair,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: i64,
}
