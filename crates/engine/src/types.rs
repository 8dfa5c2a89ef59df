// In crates/engine/src/types.rs

use core_types::{EnhancedSignal, TradingPair};
use execution::Execution;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Where in the pipeline a candle was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Strategy,
    Risk,
    Execution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Strategy => f.write_str("strategy"),
            Stage::Risk => f.write_str("risk"),
            Stage::Execution => f.write_str("execution"),
        }
    }
}

/// The result of pushing one candle through strategy, risk and execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CandleOutcome {
    /// The strategy returned a hold.
    Held,
    /// The risk manager declined the signal.
    Rejected { reason: String },
    Executed {
        signal: EnhancedSignal,
        execution: Execution,
    },
    /// A stage failed; the candle's decision was dropped.
    Skipped { stage: Stage, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Created,
    Initialized,
    Running,
    Stopped,
}

/// Summary returned by a decision loop when it stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopReport {
    pub strategy: String,
    pub pair: TradingPair,
    pub state: LoopState,
    pub held: usize,
    pub rejected: usize,
    pub executed: usize,
    pub skipped: usize,
    /// Logical time when the loop stopped.
    pub last_time: i64,
}

impl LoopReport {
    pub fn new(strategy: &str, pair: TradingPair) -> Self {
        Self {
            strategy: strategy.to_string(),
            pair,
            state: LoopState::Created,
            held: 0,
            rejected: 0,
            executed: 0,
            skipped: 0,
            last_time: 0,
        }
    }

    pub fn record(&mut self, outcome: &CandleOutcome) {
        match outcome {
            CandleOutcome::Held => self.held += 1,
            CandleOutcome::Rejected { .. } => self.rejected += 1,
            CandleOutcome::Executed { .. } => self.executed += 1,
            CandleOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Candles that went through the pipeline.
    pub fn processed(&self) -> usize {
        self.held + self.rejected + self.executed + self.skipped
    }
}

impl fmt::Display for LoopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: {:?}, held={} rejected={} executed={} skipped={} last_time={}",
            self.strategy,
            self.pair,
            self.state,
            self.held,
            self.rejected,
            self.executed,
            self.skipped,
            self.last_time
        )
    }
}

/// Serializes the risk-then-execute section of every loop sharing it, so no two
/// loops size a position from the same account snapshot.
#[derive(Debug, Clone, Default)]
pub struct DecisionGate(Arc<Mutex<()>>);

impl DecisionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enter(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}
