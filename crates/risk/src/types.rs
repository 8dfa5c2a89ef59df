// In crates/risk/src/types.rs

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account-wide risk policy. Immutable once a manager is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Largest fraction of total equity that may be lost if a stop-loss is hit, in (0, 1).
    pub max_stop_loss_ratio: Decimal,

    /// Ceiling on aggregate notional / equity across all positions.
    pub max_leverage: u32,

    /// Minimum reward:risk when a take-profit is set.
    pub min_profit_loss_ratio: Decimal,

    /// Minimum accepted signal confidence, in (50, 100].
    pub confidence_threshold: f64,
}

impl RiskConfig {
    /// Checks every field, naming the first one out of range.
    pub fn validate(&self) -> Result<()> {
        if self.max_stop_loss_ratio <= Decimal::ZERO || self.max_stop_loss_ratio >= Decimal::ONE {
            return Err(Error::InvalidParameters {
                field: "max_stop_loss_ratio",
                reason: format!("must be in (0, 1), got {}", self.max_stop_loss_ratio),
            });
        }
        if self.max_leverage == 0 {
            return Err(Error::InvalidParameters {
                field: "max_leverage",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.min_profit_loss_ratio < Decimal::ZERO {
            return Err(Error::InvalidParameters {
                field: "min_profit_loss_ratio",
                reason: format!("must be >= 0, got {}", self.min_profit_loss_ratio),
            });
        }
        // NaN fails both comparisons, so test for the accepted range.
        if !(self.confidence_threshold > 50.0 && self.confidence_threshold <= 100.0) {
            return Err(Error::InvalidParameters {
                field: "confidence_threshold",
                reason: format!("must be in (50, 100], got {}", self.confidence_threshold),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid() -> RiskConfig {
        RiskConfig {
            max_stop_loss_ratio: dec!(0.05),
            max_leverage: 10,
            min_profit_loss_ratio: dec!(1.5),
            confidence_threshold: 60.0,
        }
    }

    fn offending_field(config: RiskConfig) -> &'static str {
        match config.validate() {
            Err(Error::InvalidParameters { field, .. }) => field,
            other => panic!("expected invalid parameters, got {other:?}"),
        }
    }

    #[test]
    fn accepts_boundaries_inside_the_domain() {
        valid().validate().unwrap();
        RiskConfig { confidence_threshold: 100.0, min_profit_loss_ratio: dec!(0), ..valid() }
            .validate()
            .unwrap();
        RiskConfig { max_stop_loss_ratio: dec!(0.999), max_leverage: 1, ..valid() }
            .validate()
            .unwrap();
    }

    #[test]
    fn names_the_offending_field() {
        assert_eq!(
            offending_field(RiskConfig { max_stop_loss_ratio: dec!(0), ..valid() }),
            "max_stop_loss_ratio"
        );
        assert_eq!(
            offending_field(RiskConfig { max_stop_loss_ratio: dec!(1), ..valid() }),
            "max_stop_loss_ratio"
        );
        assert_eq!(offending_field(RiskConfig { max_leverage: 0, ..valid() }), "max_leverage");
        assert_eq!(
            offending_field(RiskConfig { min_profit_loss_ratio: dec!(-0.1), ..valid() }),
            "min_profit_loss_ratio"
        );
        for threshold in [50.0, 0.6, 100.5, f64::NAN] {
            assert_eq!(
                offending_field(RiskConfig { confidence_threshold: threshold, ..valid() }),
                "confidence_threshold"
            );
        }
    }

    #[test]
    fn error_message_mentions_the_field() {
        let err = RiskConfig { max_leverage: 0, ..valid() }.validate().unwrap_err();
        assert!(err.to_string().contains("max_leverage"));
    }
}
