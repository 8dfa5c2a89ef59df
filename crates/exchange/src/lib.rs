// In crates/exchange/src/lib.rs

use async_trait::async_trait;
use core_types::{
    AccountInfo, HistoryFilter, Interval, Kline, KlineRequest, OrderRef, Position,
    PositionHistory, PositionSide, TradingPair,
};
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use std::sync::Arc;

pub mod error;
pub mod simulated;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use simulated::SimulatedExchange;
pub use types::{OpenPositionRequest, SimulationSettings};

/// A live or replayed stream of completed klines. Ends when the feed closes.
pub type KlineStream = BoxStream<'static, Result<Kline>>;

/// Market data access.
#[async_trait]
pub trait MarketService: Send + Sync {
    /// The latest traded (or mark) price of a pair.
    async fn ticker(&self, pair: &TradingPair) -> Result<Decimal>;

    /// Historical klines matching the request, oldest first.
    async fn get_klines(&self, request: &KlineRequest) -> Result<Vec<Kline>>;

    /// Subscribes to completed klines of one pair and interval.
    async fn subscribe_kline(&self, pair: &TradingPair, interval: Interval)
    -> Result<KlineStream>;
}

/// Position queries and per-pair settings.
#[async_trait]
pub trait PositionService: Send + Sync {
    /// Active positions of the given pairs. An empty slice selects every pair.
    async fn get_active_positions(&self, pairs: &[TradingPair]) -> Result<Vec<Position>>;

    async fn get_history_positions(&self, filter: &HistoryFilter) -> Result<Vec<PositionHistory>>;

    async fn set_leverage(&self, pair: &TradingPair, leverage: u32) -> Result<()>;
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn get_account_info(&self) -> Result<AccountInfo>;
}

/// Order placement. Implementations are responsible for serializing concurrent
/// mutations of the same account.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Opens a new position with attached take-profit/stop-loss orders.
    async fn open_position(&self, request: &OpenPositionRequest) -> Result<OrderRef>;

    /// Increases an existing position on the same side.
    async fn add_position(&self, request: &OpenPositionRequest) -> Result<OrderRef> {
        self.open_position(request).await
    }

    async fn close_position(
        &self,
        pair: &TradingPair,
        side: PositionSide,
        close_all: bool,
    ) -> Result<OrderRef>;

    /// Cancels every resting order of the pair.
    async fn cancel_orders(&self, pair: &TradingPair) -> Result<()>;
}

/// Handles to every exchange service, usually all backed by one connection.
#[derive(Clone)]
pub struct ExchangeServices {
    pub market: Arc<dyn MarketService>,
    pub positions: Arc<dyn PositionService>,
    pub account: Arc<dyn AccountService>,
    pub orders: Arc<dyn OrderService>,
}

impl ExchangeServices {
    pub fn from_exchange<E>(exchange: Arc<E>) -> Self
    where
        E: MarketService + PositionService + AccountService + OrderService + 'static,
    {
        Self {
            market: exchange.clone(),
            positions: exchange.clone(),
            account: exchange.clone(),
            orders: exchange,
        }
    }
}
