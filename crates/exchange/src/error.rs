// In crates/exchange/src/error.rs

use core_types::{Interval, PositionSide, TradingPair};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("No market price available for {0}")]
    NoPrice(TradingPair),
    #[error("No kline data loaded for {pair} {interval}")]
    NoData { pair: TradingPair, interval: Interval },
    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Decimal, available: Decimal },
    #[error("A {side} position is already open for {pair}")]
    PositionExists { pair: TradingPair, side: PositionSide },
    #[error("No {side} position open for {pair}")]
    NoPosition { pair: TradingPair, side: PositionSide },
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("API error: code {code}, msg: {msg}")]
    ApiError { code: i64, msg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
