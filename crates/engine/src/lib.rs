// In crates/engine/src/lib.rs

pub mod clock;
pub mod context;
pub mod task;
pub mod types;

pub use clock::LogicalClock;
pub use context::EngineContext;
pub use task::DecisionLoop;
pub use types::{CandleOutcome, DecisionGate, LoopReport, LoopState, Stage};

use anyhow::Result;
use app_config::EngineSettings;
use exchange::ExchangeServices;
use execution::{Executor, PositionReconciler};
use futures::future;
use risk::{LeverageRiskManager, RiskConfig, RiskManager};
use std::sync::Arc;
use strategies::Strategy;
use tokio::sync::watch;

/// The portfolio-level orchestrator: one decision loop per strategy, all
/// trading the same account.
pub struct Engine {
    services: ExchangeServices,
    risk_manager: Arc<dyn RiskManager>,
    executor: Arc<dyn Executor>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        services: ExchangeServices,
        risk_manager: Arc<dyn RiskManager>,
        executor: Arc<dyn Executor>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            services,
            risk_manager,
            executor,
            settings,
        }
    }

    /// Wires the leverage risk manager and the position reconciler onto the
    /// given exchange services. Fails if the risk configuration is invalid.
    pub fn from_config(
        services: ExchangeServices,
        risk_config: RiskConfig,
        settings: EngineSettings,
    ) -> Result<Self> {
        let risk_manager = LeverageRiskManager::new(
            risk_config,
            services.market.clone(),
            services.account.clone(),
            services.positions.clone(),
        )?;
        let executor = PositionReconciler::new(services.positions.clone(), services.orders.clone());
        Ok(Self::new(
            services,
            Arc::new(risk_manager),
            Arc::new(executor),
            settings,
        ))
    }

    /// Spawns a decision loop per strategy and waits for all of them to stop.
    /// Loops stop on their own when their kline stream ends, or together when
    /// `shutdown` turns true.
    pub async fn run(
        &self,
        strategies: Vec<Box<dyn Strategy>>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<LoopReport>> {
        if strategies.is_empty() {
            anyhow::bail!("No strategies to run. Check your live.toml configuration.");
        }
        tracing::info!("Initializing Portfolio Orchestrator Engine...");

        let gate = self
            .settings
            .serialize_account_access
            .then(DecisionGate::new);

        let mut task_handles = vec![];
        for strategy in strategies {
            tracing::info!(
                strategy = strategy.name(),
                pair = %strategy.trading_pair(),
                interval = %strategy.interval(),
                "Setting up decision loop."
            );
            let task = DecisionLoop::new(
                strategy,
                self.risk_manager.clone(),
                self.executor.clone(),
                self.services.clone(),
            )
            .with_gate(gate.clone())
            .with_end_time(self.settings.end_time);

            task_handles.push(tokio::spawn(task.run(shutdown.clone())));
        }
        tracing::info!(count = task_handles.len(), "All decision loops have been spawned.");

        let mut reports = Vec::with_capacity(task_handles.len());
        for result in future::join_all(task_handles).await {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(error = %e, "Decision loop task failed."),
            }
        }
        Ok(reports)
    }
}
