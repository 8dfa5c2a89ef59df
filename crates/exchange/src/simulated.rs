// In crates/exchange/src/simulated.rs

use crate::types::{
    ConditionalKind, ConditionalOrder, OpenPosition, OpenPositionRequest, Portfolio, ReplayData,
    SimulationSettings,
};
use crate::{
    AccountService, Error, KlineStream, MarketService, OrderService, PositionService, Result,
};
use async_stream::stream;
use async_trait::async_trait;
use core_types::{
    AccountInfo, HistoryFilter, Interval, Kline, KlineRequest, OrderRef, Position,
    PositionHistory, PositionSide, TradingPair,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

type StreamKey = (TradingPair, Interval);

/// A paper-trading exchange that replays historical klines.
///
/// Every read and mutation of the account goes through one mutex, so concurrent
/// decision loops observe a serialized account. Opening enforces a hard margin
/// ceiling against the available balance.
#[derive(Clone)]
pub struct SimulatedExchange {
    settings: Arc<SimulationSettings>,
    portfolio: Arc<Mutex<Portfolio>>,
    data: Arc<RwLock<HashMap<StreamKey, ReplayData>>>,
}

impl SimulatedExchange {
    pub fn new(settings: SimulationSettings) -> Self {
        let portfolio = Portfolio::new(settings.initial_balance);
        Self {
            settings: Arc::new(settings),
            portfolio: Arc::new(Mutex::new(portfolio)),
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Loads the klines of one stream. The first `warmup` klines are treated as
    /// history already visible to strategies; replay starts after them.
    pub async fn load_klines(
        &self,
        pair: TradingPair,
        interval: Interval,
        mut klines: Vec<Kline>,
        warmup: usize,
    ) {
        klines.sort_by_key(|k| k.open_time);
        klines.dedup_by_key(|k| k.open_time);
        let replay_from = warmup.min(klines.len());

        if let Some(last) = replay_from.checked_sub(1).and_then(|i| klines.get(i)) {
            let mut portfolio = self.portfolio.lock().await;
            portfolio.marks.insert(pair.clone(), last.close);
            portfolio.clocks.insert(pair.clone(), last.close_time);
        }

        info!(pair = %pair, %interval, count = klines.len(), replay_from, "Loaded replay klines.");
        self.data
            .write()
            .await
            .insert((pair, interval), ReplayData { klines, replay_from });
    }

    /// Realized wallet balance.
    pub async fn cash(&self) -> Decimal {
        self.portfolio.lock().await.cash
    }

    /// Resting conditional orders of a pair.
    pub async fn open_orders(&self, pair: &TradingPair) -> Vec<ConditionalOrder> {
        self.portfolio
            .lock()
            .await
            .orders
            .get(pair)
            .cloned()
            .unwrap_or_default()
    }

    /// Marks the pair to the kline close and fires any triggered exits.
    ///
    /// Several subscribers may replay the same pair. Only the first one to reach
    /// a kline moves the account forward; later arrivals leave it untouched so
    /// the mark and clock never go backwards.
    async fn on_kline(&self, pair: &TradingPair, kline: &Kline) {
        let mut portfolio = self.portfolio.lock().await;
        if portfolio
            .clocks
            .get(pair)
            .is_some_and(|now| kline.close_time <= *now)
        {
            debug!(pair = %pair, close_time = kline.close_time, "Kline already replayed.");
            return;
        }
        portfolio.marks.insert(pair.clone(), kline.close);
        portfolio.clocks.insert(pair.clone(), kline.close_time);

        let orders = portfolio.orders.get(pair).cloned().unwrap_or_default();
        for side in [PositionSide::Long, PositionSide::Short] {
            if !portfolio.open_positions.contains_key(&(pair.clone(), side)) {
                continue;
            }
            let trigger = |kind: ConditionalKind| {
                orders
                    .iter()
                    .find(|o| o.side == side && o.kind == kind)
                    .map(|o| o.trigger)
            };
            let stop_hit = trigger(ConditionalKind::StopLoss).filter(|sl| match side {
                PositionSide::Long => kline.low <= *sl,
                _ => kline.high >= *sl,
            });
            let take_hit = trigger(ConditionalKind::TakeProfit).filter(|tp| match side {
                PositionSide::Long => kline.high >= *tp,
                _ => kline.low <= *tp,
            });

            // A bar touching both levels is assumed to hit the stop first.
            let hit = stop_hit
                .map(|p| (ConditionalKind::StopLoss, p))
                .or(take_hit.map(|p| (ConditionalKind::TakeProfit, p)));
            if let Some((kind, price)) = hit {
                match portfolio.settle(pair, side, price, self.settings.taker_fee) {
                    Ok(record) => info!(
                        pair = %pair,
                        %side,
                        ?kind,
                        price = %price,
                        pnl = %record.realized_pnl,
                        "Conditional exit triggered."
                    ),
                    Err(e) => warn!(pair = %pair, error = %e, "Failed to settle triggered exit."),
                }
                portfolio.remove_orders(pair, side);
            }
        }
    }

    fn enter(
        &self,
        portfolio: &mut Portfolio,
        request: &OpenPositionRequest,
    ) -> Result<OrderRef> {
        let pair = &request.pair;
        let mark = portfolio.mark(pair)?;
        let price = adverse_price(mark, request.side, true, self.settings.slippage_percent);
        let notional = request.quantity * price;
        let fee = notional * self.settings.taker_fee;
        let leverage = portfolio
            .leverage
            .get(pair)
            .copied()
            .unwrap_or(self.settings.default_leverage)
            .max(1);
        let margin = notional / Decimal::from(leverage);

        // Fees come out of the wallet; only margin is held against availability.
        let available = portfolio.account_info().available_balance;
        if margin > available {
            return Err(Error::InsufficientMargin {
                required: margin,
                available,
            });
        }

        portfolio.cash -= fee;
        let now = portfolio.now(pair);
        let key = (pair.clone(), request.side);
        match portfolio.open_positions.get_mut(&key) {
            Some(position) => {
                let quantity = position.quantity + request.quantity;
                position.entry_price = (position.entry_price * position.quantity
                    + price * request.quantity)
                    / quantity;
                position.quantity = quantity;
                position.leverage = leverage;
                position.margin += margin;
                position.updated_at = now;
            }
            None => {
                portfolio.open_positions.insert(
                    key,
                    OpenPosition {
                        quantity: request.quantity,
                        entry_price: price,
                        leverage,
                        margin,
                        opened_at: now,
                        updated_at: now,
                    },
                );
            }
        }

        if let Some(stop_loss) = request.stop_loss {
            portfolio.attach(pair, request.side, ConditionalKind::StopLoss, stop_loss);
        }
        if let Some(take_profit) = request.take_profit {
            portfolio.attach(pair, request.side, ConditionalKind::TakeProfit, take_profit);
        }

        Ok(OrderRef {
            id: portfolio.next_id(),
            pair: pair.clone(),
            side: request.side,
            quantity: request.quantity,
            price,
            timestamp: now,
        })
    }
}

impl Portfolio {
    fn mark(&self, pair: &TradingPair) -> Result<Decimal> {
        self.marks
            .get(pair)
            .copied()
            .ok_or_else(|| Error::NoPrice(pair.clone()))
    }

    fn now(&self, pair: &TradingPair) -> i64 {
        self.clocks.get(pair).copied().unwrap_or_default()
    }

    fn next_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("SIM-{}", self.next_order_id)
    }

    fn attach(
        &mut self,
        pair: &TradingPair,
        side: PositionSide,
        kind: ConditionalKind,
        trigger: Decimal,
    ) {
        let id = self.next_id();
        let orders = self.orders.entry(pair.clone()).or_default();
        orders.retain(|o| !(o.side == side && o.kind == kind));
        orders.push(ConditionalOrder {
            id,
            side,
            kind,
            trigger,
        });
    }

    fn remove_orders(&mut self, pair: &TradingPair, side: PositionSide) {
        if let Some(orders) = self.orders.get_mut(pair) {
            orders.retain(|o| o.side != side);
        }
    }

    /// Removes a position, realizing its PnL net of the exit fee.
    fn settle(
        &mut self,
        pair: &TradingPair,
        side: PositionSide,
        exit_price: Decimal,
        fee_rate: Decimal,
    ) -> Result<PositionHistory> {
        let position = self
            .open_positions
            .remove(&(pair.clone(), side))
            .ok_or_else(|| Error::NoPosition {
                pair: pair.clone(),
                side,
            })?;

        let pnl = (exit_price - position.entry_price) * position.quantity * direction(side);
        let fee = position.quantity * exit_price * fee_rate;
        self.cash += pnl - fee;

        let record = PositionHistory {
            pair: pair.clone(),
            side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            realized_pnl: pnl - fee,
            fee,
            opened_at: position.opened_at,
            closed_at: self.now(pair),
        };
        self.history.push(record.clone());
        Ok(record)
    }

    fn to_position(&self, pair: &TradingPair, side: PositionSide, open: &OpenPosition) -> Position {
        let mark_price = self.marks.get(pair).copied().unwrap_or(open.entry_price);
        Position {
            pair: pair.clone(),
            side,
            quantity: open.quantity,
            entry_price: open.entry_price,
            mark_price,
            leverage: open.leverage,
            margin: open.margin,
            unrealized_pnl: (mark_price - open.entry_price) * open.quantity * direction(side),
            created_at: open.opened_at,
            updated_at: open.updated_at,
        }
    }

    fn account_info(&self) -> AccountInfo {
        let (unrealized_pnl, used_margin) = self.open_positions.iter().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(pnl, margin), ((pair, side), open)| {
                let position = self.to_position(pair, *side, open);
                (pnl + position.unrealized_pnl, margin + open.margin)
            },
        );
        let total_balance = self.cash + unrealized_pnl;
        AccountInfo {
            total_balance,
            available_balance: total_balance - used_margin,
            used_margin,
            unrealized_pnl,
        }
    }
}

fn direction(side: PositionSide) -> Decimal {
    match side {
        PositionSide::Short => Decimal::NEGATIVE_ONE,
        _ => Decimal::ONE,
    }
}

/// Market fills always slip against the trader.
fn adverse_price(mark: Decimal, side: PositionSide, opening: bool, slippage: Decimal) -> Decimal {
    let buying = (side == PositionSide::Long) == opening;
    if buying {
        mark * (Decimal::ONE + slippage)
    } else {
        mark * (Decimal::ONE - slippage)
    }
}

fn validate_request(request: &OpenPositionRequest) -> Result<()> {
    if request.side == PositionSide::Both {
        return Err(Error::InvalidOrder(
            "one-way (BOTH) positions are not supported".to_string(),
        ));
    }
    if request.quantity <= Decimal::ZERO {
        return Err(Error::InvalidOrder(format!(
            "quantity must be positive, got {}",
            request.quantity
        )));
    }
    let non_positive = |p: &Option<Decimal>| p.is_some_and(|p| p <= Decimal::ZERO);
    if non_positive(&request.stop_loss) || non_positive(&request.take_profit) {
        return Err(Error::InvalidOrder(
            "conditional prices must be positive".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl MarketService for SimulatedExchange {
    async fn ticker(&self, pair: &TradingPair) -> Result<Decimal> {
        self.portfolio.lock().await.mark(pair)
    }

    async fn get_klines(&self, request: &KlineRequest) -> Result<Vec<Kline>> {
        let now = self.portfolio.lock().await.clocks.get(&request.pair).copied();
        let data = self.data.read().await;
        let replay = data
            .get(&(request.pair.clone(), request.interval))
            .ok_or_else(|| Error::NoData {
                pair: request.pair.clone(),
                interval: request.interval,
            })?;

        // Nothing is visible before the pair's replay clock starts.
        let Some(now) = now else {
            return Ok(Vec::new());
        };

        let mut klines: Vec<Kline> = replay
            .klines
            .iter()
            .filter(|k| k.close_time <= now)
            .filter(|k| request.start.is_none_or(|s| k.open_time >= s))
            .filter(|k| request.end.is_none_or(|e| k.close_time <= e))
            .cloned()
            .collect();
        if let Some(limit) = request.limit {
            let excess = klines.len().saturating_sub(limit);
            klines.drain(..excess);
        }
        Ok(klines)
    }

    async fn subscribe_kline(&self, pair: &TradingPair, interval: Interval) -> Result<KlineStream> {
        let klines = {
            let data = self.data.read().await;
            let replay = data
                .get(&(pair.clone(), interval))
                .ok_or_else(|| Error::NoData {
                    pair: pair.clone(),
                    interval,
                })?;
            replay.klines[replay.replay_from..].to_vec()
        };

        let exchange = self.clone();
        let pair = pair.clone();
        let replay = stream! {
            for kline in klines {
                exchange.on_kline(&pair, &kline).await;
                yield Ok::<Kline, Error>(kline);
            }
            info!(pair = %pair, %interval, "Replay data exhausted.");
        };
        Ok(Box::pin(replay))
    }
}

#[async_trait]
impl PositionService for SimulatedExchange {
    async fn get_active_positions(&self, pairs: &[TradingPair]) -> Result<Vec<Position>> {
        let portfolio = self.portfolio.lock().await;
        let mut positions: Vec<Position> = portfolio
            .open_positions
            .iter()
            .filter(|((pair, _), _)| pairs.is_empty() || pairs.contains(pair))
            .map(|((pair, side), open)| portfolio.to_position(pair, *side, open))
            .collect();
        positions.sort_by(|a, b| (&a.pair, a.side as u8).cmp(&(&b.pair, b.side as u8)));
        Ok(positions)
    }

    async fn get_history_positions(&self, filter: &HistoryFilter) -> Result<Vec<PositionHistory>> {
        let portfolio = self.portfolio.lock().await;
        Ok(portfolio
            .history
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn set_leverage(&self, pair: &TradingPair, leverage: u32) -> Result<()> {
        if leverage == 0 {
            return Err(Error::InvalidOrder("leverage must be at least 1".to_string()));
        }
        debug!(pair = %pair, leverage, "Leverage set.");
        self.portfolio
            .lock()
            .await
            .leverage
            .insert(pair.clone(), leverage);
        Ok(())
    }
}

#[async_trait]
impl AccountService for SimulatedExchange {
    async fn get_account_info(&self) -> Result<AccountInfo> {
        Ok(self.portfolio.lock().await.account_info())
    }
}

#[async_trait]
impl OrderService for SimulatedExchange {
    async fn open_position(&self, request: &OpenPositionRequest) -> Result<OrderRef> {
        validate_request(request)?;
        let mut portfolio = self.portfolio.lock().await;
        if portfolio
            .open_positions
            .contains_key(&(request.pair.clone(), request.side))
        {
            return Err(Error::PositionExists {
                pair: request.pair.clone(),
                side: request.side,
            });
        }
        let order = self.enter(&mut portfolio, request)?;
        info!(
            pair = %order.pair,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.price,
            "Position opened."
        );
        Ok(order)
    }

    async fn add_position(&self, request: &OpenPositionRequest) -> Result<OrderRef> {
        validate_request(request)?;
        let mut portfolio = self.portfolio.lock().await;
        let order = self.enter(&mut portfolio, request)?;
        info!(
            pair = %order.pair,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.price,
            "Position increased."
        );
        Ok(order)
    }

    async fn close_position(
        &self,
        pair: &TradingPair,
        side: PositionSide,
        close_all: bool,
    ) -> Result<OrderRef> {
        if !close_all {
            return Err(Error::InvalidOrder(
                "partial closes are not supported".to_string(),
            ));
        }
        let mut portfolio = self.portfolio.lock().await;
        let mark = portfolio.mark(pair)?;
        let price = adverse_price(mark, side, false, self.settings.slippage_percent);
        let record = portfolio.settle(pair, side, price, self.settings.taker_fee)?;
        info!(pair = %pair, %side, price = %price, pnl = %record.realized_pnl, "Position closed.");
        Ok(OrderRef {
            id: portfolio.next_id(),
            pair: pair.clone(),
            side,
            quantity: record.quantity,
            price,
            timestamp: record.closed_at,
        })
    }

    async fn cancel_orders(&self, pair: &TradingPair) -> Result<()> {
        let removed = self
            .portfolio
            .lock()
            .await
            .orders
            .remove(pair)
            .map(|orders| orders.len())
            .unwrap_or_default();
        debug!(pair = %pair, removed, "Orders cancelled.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rust_decimal_macros::dec;

    fn btc() -> TradingPair {
        TradingPair::new("BTC", "USDT")
    }

    fn kline(i: i64, low: Decimal, high: Decimal, close: Decimal) -> Kline {
        Kline {
            open_time: i * 60_000,
            open: close,
            high,
            low,
            close,
            volume: dec!(1),
            close_time: i * 60_000 + 59_999,
        }
    }

    fn frictionless() -> SimulationSettings {
        SimulationSettings {
            initial_balance: dec!(10000),
            taker_fee: dec!(0),
            slippage_percent: dec!(0),
            default_leverage: 1,
        }
    }

    fn long(quantity: Decimal) -> OpenPositionRequest {
        OpenPositionRequest {
            pair: btc(),
            side: PositionSide::Long,
            quantity,
            take_profit: Some(dec!(110)),
            stop_loss: Some(dec!(95)),
        }
    }

    async fn exchange_at(price: Decimal) -> SimulatedExchange {
        let exchange = SimulatedExchange::new(frictionless());
        exchange
            .load_klines(btc(), Interval::OneMinute, vec![kline(0, price, price, price)], 1)
            .await;
        exchange
    }

    #[tokio::test]
    async fn open_then_close_realizes_pnl() {
        let exchange = exchange_at(dec!(100)).await;
        exchange.set_leverage(&btc(), 5).await.unwrap();
        exchange.open_position(&long(dec!(10))).await.unwrap();

        let account = exchange.get_account_info().await.unwrap();
        assert_eq!(account.used_margin, dec!(200));
        assert_eq!(account.available_balance, dec!(9800));

        exchange.portfolio.lock().await.marks.insert(btc(), dec!(105));
        let order = exchange
            .close_position(&btc(), PositionSide::Long, true)
            .await
            .unwrap();
        assert_eq!(order.price, dec!(105));
        assert_eq!(exchange.cash().await, dec!(10050));

        let history = exchange
            .get_history_positions(&HistoryFilter::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].realized_pnl, dec!(50));
        assert!(exchange.get_active_positions(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn margin_ceiling_is_enforced() {
        let exchange = exchange_at(dec!(100)).await;
        let err = exchange.open_position(&long(dec!(101))).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientMargin { .. }));
    }

    #[tokio::test]
    async fn add_position_averages_entry() {
        let exchange = exchange_at(dec!(100)).await;
        exchange.open_position(&long(dec!(10))).await.unwrap();
        assert!(matches!(
            exchange.open_position(&long(dec!(1))).await,
            Err(Error::PositionExists { .. })
        ));

        exchange.portfolio.lock().await.marks.insert(btc(), dec!(130));
        exchange.set_leverage(&btc(), 4).await.unwrap();
        exchange.add_position(&long(dec!(10))).await.unwrap();
        let positions = exchange.get_active_positions(&[btc()]).await.unwrap();
        assert_eq!(positions[0].quantity, dec!(20));
        assert_eq!(positions[0].entry_price, dec!(115));
        // 1000 posted at 1x, then 1300 at 4x.
        assert_eq!(positions[0].leverage, 4);
        assert_eq!(positions[0].margin, dec!(1325));
        // Conditional orders are replaced, not duplicated.
        assert_eq!(exchange.open_orders(&btc()).await.len(), 2);
    }

    #[tokio::test]
    async fn replay_triggers_stop_loss() {
        let exchange = SimulatedExchange::new(frictionless());
        let klines = vec![
            kline(0, dec!(100), dec!(100), dec!(100)),
            kline(1, dec!(99), dec!(101), dec!(100)),
            kline(2, dec!(94), dec!(100), dec!(96)),
        ];
        exchange
            .load_klines(btc(), Interval::OneMinute, klines, 1)
            .await;
        exchange.open_position(&long(dec!(10))).await.unwrap();

        let mut stream = exchange
            .subscribe_kline(&btc(), Interval::OneMinute)
            .await
            .unwrap();
        let mut seen = 0;
        while let Some(kline) = stream.next().await {
            kline.unwrap();
            seen += 1;
        }

        assert_eq!(seen, 2);
        assert!(exchange.get_active_positions(&[]).await.unwrap().is_empty());
        assert_eq!(exchange.cash().await, dec!(9950));
        assert!(exchange.open_orders(&btc()).await.is_empty());
    }

    #[tokio::test]
    async fn history_is_never_ahead_of_the_replay_clock() {
        let exchange = SimulatedExchange::new(frictionless());
        let klines = (0..5).map(|i| kline(i, dec!(1), dec!(1), dec!(1))).collect();
        exchange
            .load_klines(btc(), Interval::OneMinute, klines, 3)
            .await;

        let request = KlineRequest::new(btc(), Interval::OneMinute);
        assert_eq!(exchange.get_klines(&request).await.unwrap().len(), 3);
        let limited = exchange.get_klines(&request.with_limit(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].open_time, 2 * 60_000);

        let mut stream = exchange
            .subscribe_kline(&btc(), Interval::OneMinute)
            .await
            .unwrap();
        stream.next().await.unwrap().unwrap();
        let request = KlineRequest::new(btc(), Interval::OneMinute);
        assert_eq!(exchange.get_klines(&request).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn a_second_subscriber_never_rewinds_the_account() {
        let exchange = SimulatedExchange::new(frictionless());
        let klines = (0..6)
            .map(|i| {
                let close = Decimal::from(100 + 10 * i);
                kline(i, close, close, close)
            })
            .collect();
        exchange
            .load_klines(btc(), Interval::OneMinute, klines, 1)
            .await;

        let mut first = exchange
            .subscribe_kline(&btc(), Interval::OneMinute)
            .await
            .unwrap();
        let mut second = exchange
            .subscribe_kline(&btc(), Interval::OneMinute)
            .await
            .unwrap();
        for _ in 0..3 {
            first.next().await.unwrap().unwrap();
        }
        assert_eq!(exchange.ticker(&btc()).await.unwrap(), dec!(130));

        let lagging = second.next().await.unwrap().unwrap();
        assert_eq!(lagging.close, dec!(110));
        assert_eq!(exchange.ticker(&btc()).await.unwrap(), dec!(130));
        let request = KlineRequest::new(btc(), Interval::OneMinute);
        assert_eq!(exchange.get_klines(&request).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn unknown_stream_is_an_error() {
        let exchange = SimulatedExchange::new(frictionless());
        assert!(matches!(
            exchange.subscribe_kline(&btc(), Interval::OneHour).await,
            Err(Error::NoData { .. })
        ));
        assert!(matches!(exchange.ticker(&btc()).await, Err(Error::NoPrice(_))));
    }
}
