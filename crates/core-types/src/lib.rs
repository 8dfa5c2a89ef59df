// In crates/core-types/src/lib.rs

pub mod account;
pub mod error;
pub mod strategy;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use account::{AccountInfo, HistoryFilter, OrderRef, Position, PositionHistory};
pub use error::{Error, Result};
pub use strategy::StrategyConfig;
pub use types::{
    Action, EnhancedSignal, HandleSignalResult, Interval, Kline, KlineRequest, PositionSide,
    Signal, TradingPair,
};
