// In crates/core-types/src/types.rs

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A base/quote asset pair, e.g. BTC/USDT.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// The exchange symbol, e.g. `BTCUSDT`.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = Error;

    /// Accepts `BTC/USDT` or `BTC-USDT`.
    fn from_str(s: &str) -> Result<Self> {
        let (base, quote) = s
            .split_once(['/', '-'])
            .ok_or_else(|| Error::InvalidTradingPair(s.to_string()))?;
        if base.trim().is_empty() || quote.trim().is_empty() {
            return Err(Error::InvalidTradingPair(s.to_string()));
        }
        Ok(Self::new(base.trim(), quote.trim()))
    }
}

/// The fixed duration of one kline bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
        }
    }

    /// Length of one bar in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        const MINUTE: i64 = 60_000;
        match self {
            Interval::OneMinute => MINUTE,
            Interval::ThreeMinutes => 3 * MINUTE,
            Interval::FiveMinutes => 5 * MINUTE,
            Interval::FifteenMinutes => 15 * MINUTE,
            Interval::ThirtyMinutes => 30 * MINUTE,
            Interval::OneHour => 60 * MINUTE,
            Interval::FourHours => 240 * MINUTE,
            Interval::OneDay => 1_440 * MINUTE,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "3m" => Ok(Interval::ThreeMinutes),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            other => Err(Error::InvalidInterval(other.to_string())),
        }
    }
}

/// One completed OHLCV bar. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// A history query against the market service.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineRequest {
    pub pair: TradingPair,
    pub interval: Interval,
    /// Inclusive lower bound on open time.
    pub start: Option<i64>,
    /// Inclusive upper bound on close time.
    pub end: Option<i64>,
    /// Keep only the most recent `limit` klines.
    pub limit: Option<usize>,
}

impl KlineRequest {
    pub fn new(pair: TradingPair, interval: Interval) -> Self {
        Self {
            pair,
            interval,
            start: None,
            end: None,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// The direction a strategy wants to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Long,
    Short,
    Hold,
}

/// A strategy's output for one candle. Confidence is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub pair: TradingPair,
    pub action: Action,
    pub timestamp: i64,
    pub confidence: f64,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub reason: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Signal {
    pub fn new(pair: TradingPair, action: Action, timestamp: i64, confidence: f64) -> Self {
        Self {
            pair,
            action,
            timestamp,
            confidence,
            take_profit: None,
            stop_loss: None,
            reason: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn hold(pair: TradingPair, timestamp: i64) -> Self {
        Self::new(pair, Action::Hold, timestamp, 0.0)
    }

    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }

    /// The stop-loss price, treating a zero price as unset.
    pub fn effective_stop_loss(&self) -> Option<Decimal> {
        self.stop_loss.filter(|p| !p.is_zero())
    }

    /// The take-profit price, treating a zero price as unset.
    pub fn effective_take_profit(&self) -> Option<Decimal> {
        self.take_profit.filter(|p| !p.is_zero())
    }
}

/// Side of an exchange position. `Both` is reported by exchanges in one-way mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

impl PositionSide {
    pub fn opposite(&self) -> Option<PositionSide> {
        match self {
            PositionSide::Long => Some(PositionSide::Short),
            PositionSide::Short => Some(PositionSide::Long),
            PositionSide::Both => None,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => f.pad("LONG"),
            PositionSide::Short => f.pad("SHORT"),
            PositionSide::Both => f.pad("BOTH"),
        }
    }
}

/// A risk-approved, sized signal ready for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedSignal {
    pub pair: TradingPair,
    pub side: PositionSide,
    /// Base-asset quantity, always strictly positive.
    pub quantity: Decimal,
    /// Leverage the quantity was sized with, in `[1, available]`.
    pub leverage: Decimal,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Decimal,
    pub timestamp: i64,
}

/// The verdict of the risk manager on one signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandleSignalResult {
    pub signal: Option<EnhancedSignal>,
    pub validated: bool,
    pub reason: String,
}

impl HandleSignalResult {
    pub fn accepted(signal: EnhancedSignal, reason: impl Into<String>) -> Self {
        Self {
            signal: Some(signal),
            validated: true,
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            signal: None,
            validated: false,
            reason: reason.into(),
        }
    }
}
