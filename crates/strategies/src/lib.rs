// In crates/strategies/src/lib.rs

use async_trait::async_trait;
use core_types::{Interval, Kline, Signal, TradingPair};
use std::sync::Arc;

pub mod context;
pub mod error;
pub mod factory;
pub mod ma_crossover;
pub mod types;

// Re-export public types
pub use context::StrategyContext;
pub use error::{Error, Result};
pub use factory::create_strategies;
pub use ma_crossover::MACrossover;
pub use types::MACrossoverSettings;

/// The universal interface for a trading strategy.
///
/// A strategy is bound to one pair and interval. It is stateful: indicator
/// values and anything else it needs are kept across calls to `on_candle`.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// The name of the strategy.
    fn name(&self) -> &'static str;

    fn trading_pair(&self) -> &TradingPair;

    fn interval(&self) -> Interval;

    /// Called once before the first candle. The context stays valid for the
    /// strategy's whole lifetime.
    async fn initialize(&mut self, context: Arc<dyn StrategyContext>) -> Result<()>;

    /// Assesses one completed candle.
    async fn on_candle(&mut self, kline: &Kline) -> Result<Signal>;

    /// Called once when the decision loop exits, whatever the reason.
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
