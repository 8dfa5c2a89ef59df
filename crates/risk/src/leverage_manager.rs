// In crates/risk/src/leverage_manager.rs

use crate::sizing::{self, Rejection};
use crate::types::RiskConfig;
use crate::{Result, RiskManager};
use async_trait::async_trait;
use core_types::{HandleSignalResult, Signal};
use exchange::{AccountService, MarketService, PositionService};
use std::sync::Arc;

/// A risk manager that sizes positions from stop-loss distance.
///
/// Leverage is the equity-at-risk budget (`max_stop_loss_ratio`) divided by the
/// signal's stop distance, scaled by confidence and capped by the leverage the
/// account has left. Account and positions are read fresh on every signal.
pub struct LeverageRiskManager {
    /// Validated policy; never changes after construction.
    config: RiskConfig,
    market: Arc<dyn MarketService>,
    account: Arc<dyn AccountService>,
    positions: Arc<dyn PositionService>,
}

impl LeverageRiskManager {
    /// Creates a manager, refusing a config with any field out of range.
    pub fn new(
        config: RiskConfig,
        market: Arc<dyn MarketService>,
        account: Arc<dyn AccountService>,
        positions: Arc<dyn PositionService>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            market,
            account,
            positions,
        })
    }

    fn reject(signal: &Signal, rejection: Rejection) -> HandleSignalResult {
        tracing::debug!(
            pair = %signal.pair,
            action = ?signal.action,
            reason = %rejection,
            "Signal rejected."
        );
        HandleSignalResult::rejected(rejection.to_string())
    }
}

#[async_trait]
impl RiskManager for LeverageRiskManager {
    fn name(&self) -> &'static str {
        "LeverageRiskManager"
    }

    async fn handle_signal(&self, signal: &Signal) -> Result<HandleSignalResult> {
        let entry = match sizing::precheck(&self.config, signal) {
            Ok(entry) => entry,
            Err(rejection) => return Ok(Self::reject(signal, rejection)),
        };

        let price = self.market.ticker(&signal.pair).await?;
        let exits = match sizing::check_exits(&self.config, &entry, price) {
            Ok(exits) => exits,
            Err(rejection) => return Ok(Self::reject(signal, rejection)),
        };

        let account = self.account.get_account_info().await?;
        let positions = self.positions.get_active_positions(&[]).await?;
        let sizing = match sizing::size(&self.config, &entry, &exits, price, &account, &positions) {
            Ok(sizing) => sizing,
            Err(rejection) => return Ok(Self::reject(signal, rejection)),
        };

        tracing::debug!(
            pair = %signal.pair,
            price = %price,
            stop_loss_ratio = %sizing.stop_loss_ratio,
            current_leverage = %sizing.current_leverage,
            theoretical_leverage = %sizing.theoretical_leverage,
            multiplier = %sizing.leverage_multiplier,
            leverage = %sizing.leverage,
            quantity = %sizing.quantity,
            "Signal sized."
        );

        let reason = format!(
            "Accepted {:?} at {}: stop-loss ratio {}, leverage {} (theoretical {}, available {})",
            signal.action,
            price,
            sizing.stop_loss_ratio.normalize(),
            sizing.leverage.normalize(),
            sizing.theoretical_leverage.normalize(),
            sizing.available_leverage.normalize(),
        );
        Ok(HandleSignalResult::accepted(
            sizing.into_signal(signal, &entry),
            reason,
        ))
    }
}
