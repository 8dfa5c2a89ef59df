// In crates/strategies/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MACrossoverSettings {
    pub fast_period: usize,
    pub slow_period: usize,

    // The confidence score to assign to signals from this strategy, 0-100.
    pub confidence: f64,

    /// Stop distance from the entry close, in percent of price.
    pub stop_loss_percent: Decimal,

    /// Take-profit distance as a multiple of the stop distance. Zero disables it.
    #[serde(default)]
    pub reward_ratio: Decimal,
}
