// In crates/exchange/src/types.rs

use core_types::{Kline, PositionHistory, PositionSide, TradingPair};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// An order to open, or add to, a position with attached conditional exits.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionRequest {
    pub pair: TradingPair,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    /// Starting wallet balance in the quote asset.
    pub initial_balance: Decimal,

    /// The taker fee charged on every fill (e.g., 0.0004 for 0.04%).
    pub taker_fee: Decimal,

    /// The simulated slippage for market orders (e.g., 0.0005 for 0.05%).
    pub slippage_percent: Decimal,

    /// Leverage applied to pairs that never had `set_leverage` called.
    #[serde(default = "default_leverage")]
    pub default_leverage: u32,
}

fn default_leverage() -> u32 {
    1
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(10_000),
            taker_fee: Decimal::new(4, 4),
            slippage_percent: Decimal::ZERO,
            default_leverage: default_leverage(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    StopLoss,
    TakeProfit,
}

/// A resting exit order attached to a position side.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalOrder {
    pub id: String,
    pub side: PositionSide,
    pub kind: ConditionalKind,
    pub trigger: Decimal,
}

/// An open position as tracked by the simulator.
#[derive(Debug, Clone)]
pub(crate) struct OpenPosition {
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub leverage: u32,
    pub margin: Decimal,
    pub opened_at: i64,
    pub updated_at: i64,
}

/// Historical klines of one stream plus where its replay begins.
#[derive(Debug, Clone)]
pub(crate) struct ReplayData {
    pub klines: Vec<Kline>,
    pub replay_from: usize,
}

/// The full state of the simulated account.
#[derive(Debug, Default)]
pub struct Portfolio {
    /// Realized wallet balance in the quote asset.
    pub cash: Decimal,
    pub(crate) open_positions: HashMap<(TradingPair, PositionSide), OpenPosition>,
    pub(crate) orders: HashMap<TradingPair, Vec<ConditionalOrder>>,
    pub(crate) leverage: HashMap<TradingPair, u32>,
    pub(crate) marks: HashMap<TradingPair, Decimal>,
    pub(crate) clocks: HashMap<TradingPair, i64>,
    pub(crate) history: Vec<PositionHistory>,
    pub(crate) next_order_id: u64,
}

impl Portfolio {
    /// Creates a new portfolio with an initial cash balance.
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            ..Default::default()
        }
    }
}
