// In crates/strategies/src/ma_crossover.rs

use crate::types::MACrossoverSettings;
use crate::{Error, Result, Strategy, StrategyContext};
use async_trait::async_trait;
use core_types::{Action, Interval, Kline, KlineRequest, Signal, TradingPair};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use ta::Next;
use ta::indicators::ExponentialMovingAverage as Ema;
use tracing::debug;

/// EMA fast/slow crossover on closes.
pub struct MACrossover {
    pair: TradingPair,
    interval: Interval,
    settings: MACrossoverSettings,
    fast_ema: Ema,
    slow_ema: Ema,
    /// EMA values after the previous close, once warmed up.
    last: Option<(f64, f64)>,
    /// Closes fed so far.
    seen: usize,
    last_open_time: Option<i64>,
    context: Option<Arc<dyn StrategyContext>>,
}

impl MACrossover {
    pub fn new(
        pair: TradingPair,
        interval: Interval,
        settings: MACrossoverSettings,
    ) -> Result<Self> {
        if settings.fast_period == 0 || settings.fast_period >= settings.slow_period {
            return Err(Error::InvalidSettings(format!(
                "fast_period ({}) must be positive and below slow_period ({})",
                settings.fast_period, settings.slow_period
            )));
        }
        if !(0.0..=100.0).contains(&settings.confidence) {
            return Err(Error::InvalidSettings(format!(
                "confidence must be in [0, 100], got {}",
                settings.confidence
            )));
        }
        if settings.stop_loss_percent <= Decimal::ZERO
            || settings.stop_loss_percent >= Decimal::ONE_HUNDRED
        {
            return Err(Error::InvalidSettings(format!(
                "stop_loss_percent must be in (0, 100), got {}",
                settings.stop_loss_percent
            )));
        }
        if settings.reward_ratio < Decimal::ZERO {
            return Err(Error::InvalidSettings(format!(
                "reward_ratio must be >= 0, got {}",
                settings.reward_ratio
            )));
        }

        let fast_ema = Ema::new(settings.fast_period).map_err(|e| Error::Indicator(e.to_string()))?;
        let slow_ema = Ema::new(settings.slow_period).map_err(|e| Error::Indicator(e.to_string()))?;
        Ok(Self {
            pair,
            interval,
            settings,
            fast_ema,
            slow_ema,
            last: None,
            seen: 0,
            last_open_time: None,
            context: None,
        })
    }

    /// Feeds one close and reports a crossover, if any.
    fn update(&mut self, kline: &Kline) -> Result<Option<Action>> {
        let close = kline.close.to_f64().ok_or_else(|| {
            Error::Indicator(format!("close {} is not representable", kline.close))
        })?;
        let fast = self.fast_ema.next(close);
        let slow = self.slow_ema.next(close);
        self.seen += 1;
        self.last_open_time = Some(kline.open_time);

        // The slow EMA is meaningless until it has seen a full period.
        if self.seen < self.settings.slow_period {
            return Ok(None);
        }
        let Some((prev_fast, prev_slow)) = self.last.replace((fast, slow)) else {
            return Ok(None);
        };

        let action = if fast > slow && prev_fast <= prev_slow {
            Some(Action::Long)
        } else if fast < slow && prev_fast >= prev_slow {
            Some(Action::Short)
        } else {
            None
        };
        Ok(action)
    }

    fn entry_signal(&self, action: Action, kline: &Kline, now: i64) -> Signal {
        let price = kline.close;
        let distance = price * self.settings.stop_loss_percent / Decimal::ONE_HUNDRED;
        let reward = distance * self.settings.reward_ratio;
        let (stop_loss, take_profit) = match action {
            Action::Short => (price + distance, price - reward),
            _ => (price - distance, price + reward),
        };

        let mut signal = Signal::new(self.pair.clone(), action, now, self.settings.confidence)
            .with_stop_loss(stop_loss)
            .with_reason(format!(
                "EMA({}) crossed {} EMA({}) at {}",
                self.settings.fast_period,
                if action == Action::Long { "above" } else { "below" },
                self.settings.slow_period,
                price
            ))
            .with_metadata("close", price.to_string());
        if !reward.is_zero() {
            signal = signal.with_take_profit(take_profit);
        }
        signal
    }
}

#[async_trait]
impl Strategy for MACrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn trading_pair(&self) -> &TradingPair {
        &self.pair
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    async fn initialize(&mut self, context: Arc<dyn StrategyContext>) -> Result<()> {
        let warmup = self.settings.slow_period * 3;
        let now = context.now();
        let span = i64::try_from(warmup)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.interval.duration_ms());
        let request = KlineRequest::new(self.pair.clone(), self.interval)
            .with_range(Some(now.saturating_sub(span)), Some(now))
            .with_limit(warmup);
        let history = context.get_klines(&request).await?;
        for kline in &history {
            self.update(kline)?;
        }
        debug!(pair = %self.pair, warmup = history.len(), "MACrossover initialized.");
        self.context = Some(context);
        Ok(())
    }

    async fn on_candle(&mut self, kline: &Kline) -> Result<Signal> {
        let now = self.context.as_ref().ok_or(Error::NotInitialized)?.now();

        // Candles already consumed during warmup are not assessed twice.
        if self.last_open_time.is_some_and(|t| kline.open_time <= t) {
            return Ok(Signal::hold(self.pair.clone(), now));
        }

        match self.update(kline)? {
            Some(action) => Ok(self.entry_signal(action, kline, now)),
            None => Ok(Signal::hold(self.pair.clone(), now)),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.context = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Position;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct FixedContext {
        pair: TradingPair,
        history: Vec<Kline>,
        now: i64,
        requests: Mutex<Vec<KlineRequest>>,
    }

    #[async_trait]
    impl StrategyContext for FixedContext {
        async fn get_klines(&self, request: &KlineRequest) -> Result<Vec<Kline>> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.history.clone())
        }

        async fn get_positions(&self) -> Result<Vec<Position>> {
            Ok(Vec::new())
        }

        fn now(&self) -> i64 {
            self.now
        }

        fn trading_pair(&self) -> &TradingPair {
            &self.pair
        }
    }

    fn kline(i: i64, close: Decimal) -> Kline {
        Kline {
            open_time: i * 60_000,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            close_time: i * 60_000 + 59_999,
        }
    }

    fn settings() -> MACrossoverSettings {
        MACrossoverSettings {
            fast_period: 2,
            slow_period: 4,
            confidence: 80.0,
            stop_loss_percent: dec!(1),
            reward_ratio: dec!(2),
        }
    }

    fn strategy() -> MACrossover {
        MACrossover::new(TradingPair::new("BTC", "USDT"), Interval::OneMinute, settings()).unwrap()
    }

    async fn initialized(history: Vec<Kline>) -> MACrossover {
        let mut strategy = strategy();
        let context = Arc::new(FixedContext {
            pair: TradingPair::new("BTC", "USDT"),
            history,
            now: 42,
            requests: Mutex::new(Vec::new()),
        });
        strategy.initialize(context.clone()).await.unwrap();
        let requests = context.requests.lock().unwrap();
        assert_eq!(requests[0].limit, Some(12));
        assert_eq!(requests[0].start, Some(42 - 12 * 60_000));
        assert_eq!(requests[0].end, Some(42));
        drop(requests);
        strategy
    }

    fn falling(n: i64) -> Vec<Kline> {
        (0..n).map(|i| kline(i, Decimal::from(200 - i))).collect()
    }

    #[tokio::test]
    async fn bullish_cross_emits_long_with_exits() {
        let mut strategy = initialized(falling(6)).await;

        let signal = strategy.on_candle(&kline(6, dec!(250))).await.unwrap();

        assert_eq!(signal.action, Action::Long);
        assert_eq!(signal.timestamp, 42);
        assert_eq!(signal.confidence, 80.0);
        assert_eq!(signal.stop_loss, Some(dec!(247.5)));
        assert_eq!(signal.take_profit, Some(dec!(255)));
    }

    #[tokio::test]
    async fn bearish_cross_emits_short_above_and_below() {
        let rising: Vec<Kline> = (0..6).map(|i| kline(i, Decimal::from(100 + i))).collect();
        let mut strategy = initialized(rising).await;

        let signal = strategy.on_candle(&kline(6, dec!(50))).await.unwrap();

        assert_eq!(signal.action, Action::Short);
        assert_eq!(signal.stop_loss, Some(dec!(50.5)));
        assert_eq!(signal.take_profit, Some(dec!(49)));
    }

    #[tokio::test]
    async fn no_cross_holds() {
        let mut strategy = initialized(falling(6)).await;
        let signal = strategy.on_candle(&kline(6, dec!(150))).await.unwrap();
        assert!(signal.is_hold());
    }

    #[tokio::test]
    async fn warmup_candles_are_not_reassessed() {
        let mut strategy = initialized(falling(6)).await;
        let signal = strategy.on_candle(&kline(5, dec!(1000))).await.unwrap();
        assert!(signal.is_hold());
    }

    #[tokio::test]
    async fn zero_reward_ratio_disables_take_profit() {
        let mut strategy = MACrossover::new(
            TradingPair::new("BTC", "USDT"),
            Interval::OneMinute,
            MACrossoverSettings { reward_ratio: dec!(0), ..settings() },
        )
        .unwrap();
        let context = Arc::new(FixedContext {
            pair: TradingPair::new("BTC", "USDT"),
            history: falling(6),
            now: 1,
            requests: Mutex::new(Vec::new()),
        });
        strategy.initialize(context).await.unwrap();

        let signal = strategy.on_candle(&kline(6, dec!(250))).await.unwrap();
        assert_eq!(signal.action, Action::Long);
        assert_eq!(signal.take_profit, None);
    }

    #[tokio::test]
    async fn candle_before_initialize_is_an_error() {
        let mut strategy = strategy();
        let err = strategy.on_candle(&kline(0, dec!(1))).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn rejects_inverted_periods() {
        let result = MACrossover::new(
            TradingPair::new("BTC", "USDT"),
            Interval::OneMinute,
            MACrossoverSettings { fast_period: 5, slow_period: 5, ..settings() },
        );
        assert!(matches!(result, Err(Error::InvalidSettings(_))));
    }
}
