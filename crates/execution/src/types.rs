// In crates/execution/src/types.rs

use core_types::{OrderRef, PositionSide, TradingPair};
use serde::Serialize;

/// Whether the entry created a position or grew an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryMode {
    Open,
    Add,
}

/// What an executor did for one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    pub pair: TradingPair,
    pub side: PositionSide,
    pub mode: EntryMode,
    pub leverage: u32,
    /// The opposite-side close, when one was needed.
    pub closed: Option<OrderRef>,
    pub order: OrderRef,
}
