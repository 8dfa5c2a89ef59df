// In crates/execution/src/lib.rs

use async_trait::async_trait;
use core_types::EnhancedSignal;

pub mod error;
pub mod reconciler;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use reconciler::PositionReconciler;
pub use types::{EntryMode, Execution};

/// The universal interface for an execution handler.
///
/// An `Executor` takes a sized, risk-approved signal and turns it into exchange
/// state. A step that fails aborts everything after it; earlier steps are not
/// rolled back.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The name of the executor (e.g., "PositionReconciler").
    fn name(&self) -> &'static str;

    /// Reconciles the account with the signal's desired side and size.
    async fn execute(&self, signal: &EnhancedSignal) -> Result<Execution>;
}
