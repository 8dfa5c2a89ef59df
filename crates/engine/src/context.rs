// In crates/engine/src/context.rs

use crate::clock::LogicalClock;
use async_trait::async_trait;
use core_types::{Kline, KlineRequest, Position, TradingPair};
use exchange::{MarketService, PositionService};
use std::slice;
use std::sync::Arc;
use strategies::StrategyContext;

/// The context handed to a strategy by its decision loop.
pub struct EngineContext {
    pair: TradingPair,
    clock: Arc<LogicalClock>,
    market: Arc<dyn MarketService>,
    positions: Arc<dyn PositionService>,
}

impl EngineContext {
    pub fn new(
        pair: TradingPair,
        clock: Arc<LogicalClock>,
        market: Arc<dyn MarketService>,
        positions: Arc<dyn PositionService>,
    ) -> Self {
        Self {
            pair,
            clock,
            market,
            positions,
        }
    }
}

#[async_trait]
impl StrategyContext for EngineContext {
    async fn get_klines(&self, request: &KlineRequest) -> strategies::Result<Vec<Kline>> {
        let now = self.clock.now();
        let mut request = request.clone();
        request.end = Some(request.end.map_or(now, |end| end.min(now)));
        Ok(self.market.get_klines(&request).await?)
    }

    async fn get_positions(&self) -> strategies::Result<Vec<Position>> {
        let positions = self
            .positions
            .get_active_positions(slice::from_ref(&self.pair))
            .await?;
        Ok(positions.into_iter().filter(|p| p.pair == self.pair).collect())
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }

    fn trading_pair(&self) -> &TradingPair {
        &self.pair
    }
}
