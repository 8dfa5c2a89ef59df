// In crates/engine/src/task.rs

use crate::clock::LogicalClock;
use crate::context::EngineContext;
use crate::types::{CandleOutcome, DecisionGate, LoopReport, LoopState, Stage};
use core_types::{Kline, KlineRequest, TradingPair};
use exchange::ExchangeServices;
use execution::Executor;
use futures::StreamExt;
use risk::RiskManager;
use std::sync::Arc;
use strategies::Strategy;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Drives one strategy: every completed candle goes through the strategy, the
/// risk manager and the executor, in that order. Failures at any stage drop
/// the candle's decision and the loop moves on.
pub struct DecisionLoop {
    strategy: Box<dyn Strategy>,
    risk_manager: Arc<dyn RiskManager>,
    executor: Arc<dyn Executor>,
    services: ExchangeServices,
    gate: Option<DecisionGate>,
    end_time: Option<i64>,
    clock: Arc<LogicalClock>,
    state: LoopState,
    report: LoopReport,
}

impl DecisionLoop {
    pub fn new(
        strategy: Box<dyn Strategy>,
        risk_manager: Arc<dyn RiskManager>,
        executor: Arc<dyn Executor>,
        services: ExchangeServices,
    ) -> Self {
        let report = LoopReport::new(strategy.name(), strategy.trading_pair().clone());
        Self {
            strategy,
            risk_manager,
            executor,
            services,
            gate: None,
            end_time: None,
            clock: Arc::new(LogicalClock::default()),
            state: LoopState::Created,
            report,
        }
    }

    /// Shares a gate with other loops trading the same account.
    pub fn with_gate(mut self, gate: Option<DecisionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Stops the loop at the first candle closing after `end_time`.
    pub fn with_end_time(mut self, end_time: Option<i64>) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn clock(&self) -> &Arc<LogicalClock> {
        &self.clock
    }

    pub fn report(&self) -> &LoopReport {
        &self.report
    }

    fn pair(&self) -> &TradingPair {
        self.strategy.trading_pair()
    }

    fn transition(&mut self, state: LoopState) {
        info!(
            strategy = self.strategy.name(),
            pair = %self.pair(),
            from = ?self.state,
            to = ?state,
            "Decision loop state changed."
        );
        self.state = state;
        self.report.state = state;
    }

    /// Seeds the clock from the latest kline the market already has, then
    /// hands the strategy its context.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        let pair = self.pair().clone();
        let interval = self.strategy.interval();

        let latest = self
            .services
            .market
            .get_klines(&KlineRequest::new(pair.clone(), interval).with_limit(1))
            .await?;
        if let Some(kline) = latest.last() {
            self.clock.advance_to(kline.close_time);
        }

        let context = Arc::new(EngineContext::new(
            pair,
            self.clock.clone(),
            self.services.market.clone(),
            self.services.positions.clone(),
        ));
        self.strategy.initialize(context).await?;
        self.transition(LoopState::Initialized);
        Ok(())
    }

    /// Runs one candle through the pipeline and records the outcome.
    pub async fn process_candle(&mut self, kline: &Kline) -> CandleOutcome {
        self.clock.advance_to(kline.close_time);
        let outcome = self.evaluate(kline).await;
        self.report.record(&outcome);
        outcome
    }

    async fn evaluate(&mut self, kline: &Kline) -> CandleOutcome {
        let strategy = self.strategy.name();
        let pair = self.strategy.trading_pair().clone();

        let signal = match self.strategy.on_candle(kline).await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(strategy, pair = %pair, error = %e, "Strategy failed, skipping candle.");
                return CandleOutcome::Skipped {
                    stage: Stage::Strategy,
                    error: e.to_string(),
                };
            }
        };
        if signal.is_hold() {
            debug!(strategy, pair = %pair, close_time = kline.close_time, "Hold.");
            return CandleOutcome::Held;
        }

        info!(
            strategy,
            pair = %pair,
            action = ?signal.action,
            confidence = signal.confidence,
            reason = %signal.reason,
            "Strategy generated a signal."
        );

        let gate = self.gate.clone();
        let _guard = match &gate {
            Some(gate) => Some(gate.enter().await),
            None => None,
        };

        let verdict = match self.risk_manager.handle_signal(&signal).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(strategy, pair = %pair, error = %e, "Risk check failed, skipping candle.");
                return CandleOutcome::Skipped {
                    stage: Stage::Risk,
                    error: e.to_string(),
                };
            }
        };
        let enhanced = match verdict.signal {
            Some(enhanced) if verdict.validated => enhanced,
            _ => {
                info!(
                    strategy,
                    pair = %pair,
                    reason = %verdict.reason,
                    "Signal rejected by risk manager."
                );
                return CandleOutcome::Rejected {
                    reason: verdict.reason,
                };
            }
        };

        match self.executor.execute(&enhanced).await {
            Ok(execution) => {
                info!(
                    strategy,
                    pair = %pair,
                    side = %enhanced.side,
                    quantity = %enhanced.quantity,
                    leverage = %enhanced.leverage,
                    "Signal executed."
                );
                CandleOutcome::Executed {
                    signal: enhanced,
                    execution,
                }
            }
            Err(e) => {
                warn!(strategy, pair = %pair, error = %e, "Execution failed, skipping candle.");
                CandleOutcome::Skipped {
                    stage: Stage::Execution,
                    error: e.to_string(),
                }
            }
        }
    }

    /// The main, long-running loop. Returns when the kline stream ends, the run
    /// boundary is passed, or `shutdown` turns true. The strategy's `shutdown`
    /// is always called before returning.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LoopReport {
        let pair = self.pair().clone();
        let interval = self.strategy.interval();
        info!(strategy = self.strategy.name(), pair = %pair, %interval, "Starting decision loop.");

        if let Err(e) = self.initialize().await {
            error!(pair = %pair, error = %e, "Strategy initialization failed.");
            return self.stop().await;
        }

        let mut klines = match self.services.market.subscribe_kline(&pair, interval).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(pair = %pair, error = %e, "Kline subscription failed.");
                return self.stop().await;
            }
        };
        self.transition(LoopState::Running);

        let mut listening = true;
        loop {
            if *shutdown.borrow() {
                info!(pair = %pair, "Shutdown signal received.");
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed(), if listening => {
                    // A dropped sender can no longer request shutdown.
                    if changed.is_err() {
                        listening = false;
                    }
                }

                next = klines.next() => match next {
                    Some(Ok(kline)) => {
                        let now = self.clock.advance_to(kline.close_time);
                        if self.end_time.is_some_and(|end| now > end) {
                            info!(
                                pair = %pair,
                                close_time = kline.close_time,
                                "Run boundary reached."
                            );
                            break;
                        }
                        self.process_candle(&kline).await;
                    }
                    Some(Err(e)) => {
                        warn!(pair = %pair, error = %e, "Kline stream error, skipping.");
                    }
                    None => {
                        info!(pair = %pair, "Kline stream closed.");
                        break;
                    }
                },
            }
        }

        self.stop().await
    }

    async fn stop(mut self) -> LoopReport {
        if let Err(e) = self.strategy.shutdown().await {
            warn!(pair = %self.pair(), error = %e, "Strategy shutdown failed.");
        }
        self.transition(LoopState::Stopped);
        self.report.last_time = self.clock.now();
        info!(report = %self.report, "Decision loop finished.");
        self.report
    }
}
