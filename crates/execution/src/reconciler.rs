// In crates/execution/src/reconciler.rs

use crate::types::{EntryMode, Execution};
use crate::{Error, Executor, Result};
use async_trait::async_trait;
use core_types::{EnhancedSignal, PositionSide};
use exchange::{OpenPositionRequest, OrderService, PositionService};
use num_traits::ToPrimitive;
use std::slice;
use std::sync::Arc;
use tracing::{info, warn};

/// Brings the account's positions on a pair in line with a signal.
///
/// An opposite-side position is closed in full and the pair's resting orders
/// are cancelled before the new entry. Leverage is set to the signal's
/// leverage rounded up, so the margin actually posted never exceeds what the
/// risk manager sized for.
pub struct PositionReconciler {
    positions: Arc<dyn PositionService>,
    orders: Arc<dyn OrderService>,
}

impl PositionReconciler {
    pub fn new(positions: Arc<dyn PositionService>, orders: Arc<dyn OrderService>) -> Self {
        Self { positions, orders }
    }
}

#[async_trait]
impl Executor for PositionReconciler {
    fn name(&self) -> &'static str {
        "PositionReconciler"
    }

    async fn execute(&self, signal: &EnhancedSignal) -> Result<Execution> {
        let pair = &signal.pair;
        let side = signal.side;
        let opposite = side.opposite().ok_or(Error::UnsupportedSide(side))?;

        let existing = self
            .positions
            .get_active_positions(slice::from_ref(pair))
            .await
            .map_err(|source| Error::PositionsUnavailable { pair: pair.clone(), source })?;
        let existing: Vec<_> = existing
            .into_iter()
            .filter(|p| &p.pair == pair && !p.quantity.is_zero())
            .collect();

        // A one-way (net) position cannot be split into a close and an entry.
        if existing.iter().any(|p| p.side == PositionSide::Both) {
            return Err(Error::UnsupportedSide(PositionSide::Both));
        }
        let has_opposite = existing.iter().any(|p| p.side == opposite);
        let has_same = existing.iter().any(|p| p.side == side);

        let mut closed = None;
        if has_opposite {
            let order = self
                .orders
                .close_position(pair, opposite, true)
                .await
                .map_err(|source| {
                    warn!(
                        pair = %pair,
                        side = %opposite,
                        error = %source,
                        "Close failed, aborting."
                    );
                    Error::CloseFailed {
                        pair: pair.clone(),
                        side: opposite,
                        source,
                    }
                })?;
            info!(
                pair = %pair,
                side = %opposite,
                quantity = %order.quantity,
                price = %order.price,
                "Closed opposite position."
            );
            closed = Some(order);

            self.orders.cancel_orders(pair).await.map_err(|source| {
                warn!(pair = %pair, error = %source, "Cancel failed, aborting.");
                Error::CancelFailed { pair: pair.clone(), source }
            })?;
        }

        let leverage = signal.leverage.ceil().to_u32().unwrap_or(u32::MAX).max(1);
        self.positions
            .set_leverage(pair, leverage)
            .await
            .map_err(|source| Error::LeverageFailed { pair: pair.clone(), leverage, source })?;

        let request = OpenPositionRequest {
            pair: pair.clone(),
            side,
            quantity: signal.quantity,
            take_profit: signal.take_profit,
            stop_loss: Some(signal.stop_loss),
        };
        let (mode, placed) = if has_same {
            (EntryMode::Add, self.orders.add_position(&request).await)
        } else {
            (EntryMode::Open, self.orders.open_position(&request).await)
        };
        let order = placed.map_err(|source| Error::OpenFailed {
            pair: pair.clone(),
            side,
            source,
        })?;

        info!(
            pair = %pair,
            %side,
            ?mode,
            leverage,
            quantity = %order.quantity,
            price = %order.price,
            "Position reconciled."
        );
        Ok(Execution {
            pair: pair.clone(),
            side,
            mode,
            leverage,
            closed,
            order,
        })
    }
}
