// In crates/strategies/src/context.rs

use crate::Result;
use async_trait::async_trait;
use core_types::{Kline, KlineRequest, Position, TradingPair};

/// Read access a strategy gets to the market and the account, bound to its pair.
#[async_trait]
pub trait StrategyContext: Send + Sync {
    /// Historical klines, never later than `now()`.
    async fn get_klines(&self, request: &KlineRequest) -> Result<Vec<Kline>>;

    /// Active positions of the bound pair.
    async fn get_positions(&self) -> Result<Vec<Position>>;

    /// Logical time in epoch milliseconds: the close time of the latest
    /// candle in replay, or the latest candle seen live.
    fn now(&self) -> i64;

    fn trading_pair(&self) -> &TradingPair;
}
