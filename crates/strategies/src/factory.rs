// In crates/strategies/src/factory.rs

use crate::types::MACrossoverSettings;
use crate::{Error, MACrossover, Result, Strategy};
use core_types::{Interval, StrategyConfig, TradingPair};

/// Builds the strategies configured for one pair. Fails on the first unknown
/// name or malformed parameter table.
pub fn create_strategies(
    pair: &TradingPair,
    interval: Interval,
    pair_strategies: &[StrategyConfig],
) -> Result<Vec<Box<dyn Strategy>>> {
    let mut active_strategies = Vec::new();

    for strat_config in pair_strategies {
        let strategy_instance: Box<dyn Strategy> = match strat_config.name.as_str() {
            "ma_crossover" => {
                let settings: MACrossoverSettings = strat_config
                    .params
                    .clone()
                    .try_into()
                    .map_err(|source| Error::InvalidParams {
                        name: strat_config.name.clone(),
                        source,
                    })?;
                Box::new(MACrossover::new(pair.clone(), interval, settings)?)
            }
            unknown => return Err(Error::UnknownStrategy(unknown.to_string())),
        };
        active_strategies.push(strategy_instance);
    }

    Ok(active_strategies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, params: &str) -> StrategyConfig {
        StrategyConfig {
            name: name.to_string(),
            params: toml::from_str(params).unwrap(),
        }
    }

    fn btc() -> TradingPair {
        TradingPair::new("BTC", "USDT")
    }

    #[test]
    fn builds_configured_strategies() {
        let params = r#"
            fast_period = 9
            slow_period = 21
            confidence = 75.0
            stop_loss_percent = 1.5
            reward_ratio = 2
        "#;
        let strategies =
            create_strategies(&btc(), Interval::FifteenMinutes, &[config("ma_crossover", params)])
                .unwrap();

        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].name(), "ma_crossover");
        assert_eq!(strategies[0].trading_pair(), &btc());
        assert_eq!(strategies[0].interval(), Interval::FifteenMinutes);
    }

    #[test]
    fn unknown_name_fails() {
        let result = create_strategies(&btc(), Interval::OneHour, &[config("martingale", "")]);
        assert!(matches!(result, Err(Error::UnknownStrategy(name)) if name == "martingale"));
    }

    #[test]
    fn missing_params_fail() {
        let configs = [config("ma_crossover", "fast_period = 3")];
        let result = create_strategies(&btc(), Interval::OneHour, &configs);
        assert!(matches!(result, Err(Error::InvalidParams { .. })));
    }
}
