// In crates/risk/src/lib.rs

use async_trait::async_trait;
use core_types::{HandleSignalResult, Signal};

pub mod error;
pub mod leverage_manager;
pub mod sizing;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use leverage_manager::LeverageRiskManager;
pub use sizing::{Rejection, Sizing};
pub use types::RiskConfig;

/// The universal interface for a risk management module.
///
/// A `RiskManager` evaluates a strategy `Signal` against account-wide rules and,
/// if approved, sizes it into an `EnhancedSignal`.
#[async_trait]
pub trait RiskManager: Send + Sync {
    /// The name of the risk management strategy.
    fn name(&self) -> &'static str;

    /// Validates and sizes a signal.
    ///
    /// # Returns
    ///
    /// * `Ok(result)` with `validated == true` and a sized signal if approved.
    /// * `Ok(result)` with `validated == false` and a reason if a policy rule rejects it.
    /// * `Err(_)` only when market, account or position data could not be read.
    async fn handle_signal(&self, signal: &Signal) -> Result<HandleSignalResult>;
}
