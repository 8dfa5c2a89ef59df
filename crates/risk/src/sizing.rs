// In crates/risk/src/sizing.rs

//! Pure risk arithmetic. Nothing here performs I/O; the manager feeds it the
//! price, account snapshot and positions it fetched for one signal.
//!
//! Position size is derived from loss tolerance: the tighter the stop, the more
//! leverage the same equity-at-risk allows.

use crate::types::RiskConfig;
use core_types::{AccountInfo, Action, EnhancedSignal, Position, PositionSide, Signal};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Why a signal was declined. Rendered into `HandleSignalResult::reason`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("Signal action is HOLD; nothing to trade")]
    Hold,
    #[error("Signal confidence ({0}) is outside the 0-100 scale")]
    InvalidConfidence(f64),
    #[error("Signal confidence ({confidence:.2}) is below threshold ({threshold:.2})")]
    LowConfidence { confidence: f64, threshold: f64 },
    #[error("Stop-loss is not set")]
    StopLossNotSet,
    #[error("Market price {0} is not positive")]
    InvalidPrice(Decimal),
    #[error("Stop-loss {stop_loss} must be {expected} the current price {price} for a {side} signal")]
    StopLossWrongSide {
        side: PositionSide,
        stop_loss: Decimal,
        price: Decimal,
        expected: &'static str,
    },
    #[error("Take-profit {take_profit} must be {expected} the current price {price} for a {side} signal")]
    TakeProfitWrongSide {
        side: PositionSide,
        take_profit: Decimal,
        price: Decimal,
        expected: &'static str,
    },
    #[error("Profit/loss ratio {ratio} is below the minimum {minimum}")]
    PoorRewardRisk { ratio: Decimal, minimum: Decimal },
    #[error("Account equity {0} is not positive")]
    NonPositiveEquity(Decimal),
    #[error("Current leverage {current} already at or above the maximum {max}")]
    LeverageExhausted { current: Decimal, max: u32 },
    #[error("Adjusted leverage {0} is below 1")]
    LeverageTooLow(Decimal),
    #[error("Available balance {0} is not positive")]
    NoAvailableBalance(Decimal),
}

type Verdict<T> = std::result::Result<T, Rejection>;

/// A signal that passed the checks needing no market data.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub side: PositionSide,
    pub confidence: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Option<Decimal>,
}

/// Distances of the exits from the current price.
#[derive(Debug, Clone, PartialEq)]
pub struct Exits {
    pub stop_loss_ratio: Decimal,
    pub profit_loss_ratio: Option<Decimal>,
}

/// Every intermediate of the leverage derivation, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub stop_loss_ratio: Decimal,
    pub profit_loss_ratio: Option<Decimal>,
    pub current_leverage: Decimal,
    pub available_leverage: Decimal,
    pub theoretical_leverage: Decimal,
    pub leverage_multiplier: Decimal,
    pub leverage: Decimal,
    pub quantity: Decimal,
}

/// Action, confidence and stop-loss presence.
pub fn precheck(config: &RiskConfig, signal: &Signal) -> Verdict<Entry> {
    let side = match signal.action {
        Action::Long => PositionSide::Long,
        Action::Short => PositionSide::Short,
        Action::Hold => return Err(Rejection::Hold),
    };

    if !(0.0..=100.0).contains(&signal.confidence) {
        return Err(Rejection::InvalidConfidence(signal.confidence));
    }
    if signal.confidence < config.confidence_threshold {
        return Err(Rejection::LowConfidence {
            confidence: signal.confidence,
            threshold: config.confidence_threshold,
        });
    }
    let confidence = Decimal::from_f64(signal.confidence)
        .ok_or(Rejection::InvalidConfidence(signal.confidence))?;

    let stop_loss = signal.effective_stop_loss().ok_or(Rejection::StopLossNotSet)?;

    Ok(Entry {
        side,
        confidence,
        stop_loss,
        take_profit: signal.effective_take_profit(),
    })
}

/// Directional stop/take-profit validation and the reward:risk gate.
pub fn check_exits(config: &RiskConfig, entry: &Entry, price: Decimal) -> Verdict<Exits> {
    if price <= Decimal::ZERO {
        return Err(Rejection::InvalidPrice(price));
    }

    let (loss_distance, expected) = match entry.side {
        PositionSide::Short => (entry.stop_loss - price, "above"),
        _ => (price - entry.stop_loss, "below"),
    };
    if loss_distance <= Decimal::ZERO {
        return Err(Rejection::StopLossWrongSide {
            side: entry.side,
            stop_loss: entry.stop_loss,
            price,
            expected,
        });
    }
    let stop_loss_ratio = loss_distance / price;

    let profit_loss_ratio = match entry.take_profit {
        Some(take_profit) => {
            let (profit_distance, expected) = match entry.side {
                PositionSide::Short => (price - take_profit, "below"),
                _ => (take_profit - price, "above"),
            };
            if profit_distance <= Decimal::ZERO {
                return Err(Rejection::TakeProfitWrongSide {
                    side: entry.side,
                    take_profit,
                    price,
                    expected,
                });
            }
            let ratio = profit_distance / loss_distance;
            if ratio < config.min_profit_loss_ratio {
                return Err(Rejection::PoorRewardRisk {
                    ratio,
                    minimum: config.min_profit_loss_ratio,
                });
            }
            Some(ratio)
        }
        None => None,
    };

    Ok(Exits {
        stop_loss_ratio,
        profit_loss_ratio,
    })
}

/// Maps confidence in `[threshold, 100]` onto a leverage multiplier in `[0.5, 1.0]`.
pub fn leverage_multiplier(config: &RiskConfig, confidence: Decimal) -> Decimal {
    let threshold = Decimal::from_f64(config.confidence_threshold).unwrap_or(dec!(100));
    let span = dec!(100) - threshold;
    let adjustment = if span <= Decimal::ZERO {
        Decimal::ONE
    } else {
        ((confidence - threshold) / span).clamp(Decimal::ZERO, Decimal::ONE)
    };
    dec!(0.5) + dec!(0.5) * adjustment
}

/// Aggregate notional over total equity. Not floored, so fractional usage counts.
pub fn current_leverage(account: &AccountInfo, positions: &[Position]) -> Verdict<Decimal> {
    if account.total_balance <= Decimal::ZERO {
        return Err(Rejection::NonPositiveEquity(account.total_balance));
    }
    let exposure: Decimal = positions.iter().map(Position::notional).sum();
    Ok(exposure / account.total_balance)
}

/// Derives leverage and quantity for an entry that passed the exit checks.
pub fn size(
    config: &RiskConfig,
    entry: &Entry,
    exits: &Exits,
    price: Decimal,
    account: &AccountInfo,
    positions: &[Position],
) -> Verdict<Sizing> {
    let current_leverage = current_leverage(account, positions)?;
    let available_leverage = Decimal::from(config.max_leverage) - current_leverage;
    if available_leverage <= Decimal::ZERO {
        return Err(Rejection::LeverageExhausted {
            current: current_leverage,
            max: config.max_leverage,
        });
    }

    let theoretical_leverage = config.max_stop_loss_ratio / exits.stop_loss_ratio;
    let leverage_multiplier = leverage_multiplier(config, entry.confidence);
    let leverage = (theoretical_leverage * leverage_multiplier).min(available_leverage);
    if leverage < Decimal::ONE {
        return Err(Rejection::LeverageTooLow(leverage));
    }

    if account.available_balance <= Decimal::ZERO {
        return Err(Rejection::NoAvailableBalance(account.available_balance));
    }
    let quantity = account.available_balance * leverage / price;

    Ok(Sizing {
        stop_loss_ratio: exits.stop_loss_ratio,
        profit_loss_ratio: exits.profit_loss_ratio,
        current_leverage,
        available_leverage,
        theoretical_leverage,
        leverage_multiplier,
        leverage,
        quantity,
    })
}

impl Sizing {
    pub fn into_signal(&self, signal: &Signal, entry: &Entry) -> EnhancedSignal {
        EnhancedSignal {
            pair: signal.pair.clone(),
            side: entry.side,
            quantity: self.quantity,
            leverage: self.leverage,
            take_profit: entry.take_profit,
            stop_loss: entry.stop_loss,
            timestamp: signal.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TradingPair;

    fn config() -> RiskConfig {
        RiskConfig {
            max_stop_loss_ratio: dec!(0.05),
            max_leverage: 10,
            min_profit_loss_ratio: dec!(1.5),
            confidence_threshold: 60.0,
        }
    }

    fn account(balance: Decimal) -> AccountInfo {
        AccountInfo {
            total_balance: balance,
            available_balance: balance,
            used_margin: dec!(0),
            unrealized_pnl: dec!(0),
        }
    }

    fn long(confidence: f64, stop: Decimal) -> Signal {
        Signal::new(TradingPair::new("BTC", "USDT"), Action::Long, 0, confidence)
            .with_stop_loss(stop)
    }

    #[test]
    fn multiplier_spans_half_to_full() {
        let config = config();
        assert_eq!(leverage_multiplier(&config, dec!(60)), dec!(0.5));
        assert_eq!(leverage_multiplier(&config, dec!(80)), dec!(0.75));
        assert_eq!(leverage_multiplier(&config, dec!(100)), dec!(1));
    }

    #[test]
    fn full_threshold_has_no_zero_division() {
        let config = RiskConfig { confidence_threshold: 100.0, ..config() };
        assert_eq!(leverage_multiplier(&config, dec!(100)), dec!(1));
    }

    #[test]
    fn short_exits_are_mirrored() {
        let config = config();
        let signal = Signal::new(TradingPair::new("BTC", "USDT"), Action::Short, 0, 70.0)
            .with_stop_loss(dec!(50500))
            .with_take_profit(dec!(48500));
        let entry = precheck(&config, &signal).unwrap();
        let exits = check_exits(&config, &entry, dec!(50000)).unwrap();
        assert_eq!(exits.stop_loss_ratio, dec!(0.01));
        assert_eq!(exits.profit_loss_ratio, Some(dec!(3)));

        let wrong = signal.with_stop_loss(dec!(49000));
        let entry = precheck(&config, &wrong).unwrap();
        assert!(matches!(
            check_exits(&config, &entry, dec!(50000)),
            Err(Rejection::StopLossWrongSide { expected: "above", .. })
        ));
    }

    #[test]
    fn take_profit_on_the_wrong_side_is_rejected() {
        let config = config();
        let signal = long(80.0, dec!(49500)).with_take_profit(dec!(49000));
        let entry = precheck(&config, &signal).unwrap();
        assert!(matches!(
            check_exits(&config, &entry, dec!(50000)),
            Err(Rejection::TakeProfitWrongSide { .. })
        ));
    }

    #[test]
    fn fractional_usage_counts_against_the_ceiling() {
        let config = RiskConfig { max_leverage: 2, ..config() };
        let entry = precheck(&config, &long(100.0, dec!(49500))).unwrap();
        let exits = check_exits(&config, &entry, dec!(50000)).unwrap();
        // 1.5x already in use: 0.5x left, which is below the 1x floor.
        let position = Position {
            pair: TradingPair::new("ETH", "USDT"),
            side: PositionSide::Long,
            quantity: dec!(5),
            entry_price: dec!(3000),
            mark_price: dec!(3000),
            leverage: 2,
            margin: dec!(7500),
            unrealized_pnl: dec!(0),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(
            size(&config, &entry, &exits, dec!(50000), &account(dec!(10000)), &[position]),
            Err(Rejection::LeverageTooLow(dec!(0.5)))
        );
    }

    #[test]
    fn wide_stop_yields_sub_unit_leverage() {
        let config = config();
        let entry = precheck(&config, &long(100.0, dec!(40000))).unwrap();
        let exits = check_exits(&config, &entry, dec!(50000)).unwrap();
        // 20% stop against a 5% budget: 0.25x.
        assert_eq!(
            size(&config, &entry, &exits, dec!(50000), &account(dec!(10000)), &[]),
            Err(Rejection::LeverageTooLow(dec!(0.25)))
        );
    }

    #[test]
    fn out_of_scale_confidence_is_rejected() {
        let config = config();
        for confidence in [-1.0, 100.5, f64::NAN] {
            assert!(matches!(
                precheck(&config, &long(confidence, dec!(1))),
                Err(Rejection::InvalidConfidence(_))
            ));
        }
    }
}
