// In crates/execution/src/error.rs

use core_types::{PositionSide, TradingPair};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Failed to read positions for {pair}: {source}")]
    PositionsUnavailable {
        pair: TradingPair,
        source: exchange::Error,
    },

    #[error("Failed to close {side} position on {pair}: {source}")]
    CloseFailed {
        pair: TradingPair,
        side: PositionSide,
        source: exchange::Error,
    },

    #[error("Failed to cancel orders on {pair}: {source}")]
    CancelFailed {
        pair: TradingPair,
        source: exchange::Error,
    },

    #[error("Failed to set leverage {leverage}x on {pair}: {source}")]
    LeverageFailed {
        pair: TradingPair,
        leverage: u32,
        source: exchange::Error,
    },

    #[error("Failed to open {side} position on {pair}: {source}")]
    OpenFailed {
        pair: TradingPair,
        side: PositionSide,
        source: exchange::Error,
    },

    #[error("Unsupported position side: {0}")]
    UnsupportedSide(PositionSide),
}

pub type Result<T> = std::result::Result<T, Error>;
