// In crates/core-types/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown kline interval: {0}")]
    InvalidInterval(String),

    #[error("Malformed trading pair '{0}', expected BASE/QUOTE")]
    InvalidTradingPair(String),
}

pub type Result<T> = std::result::Result<T, Error>;
