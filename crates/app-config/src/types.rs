// In crates/app-config/src/types.rs

use crate::{Error, Result};
use core_types::{Interval, StrategyConfig, TradingPair};
use exchange::SimulationSettings;
use risk::RiskConfig;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Account-wide risk policy shared by every decision loop.
    pub risk: RiskConfig,
    /// Paper account used by replay runs.
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Settings {
    /// Checks the parts that deserialization alone cannot.
    pub fn validate(&self) -> Result<()> {
        self.risk.validate()?;
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Serialize the risk-then-execute section across all loops of this process.
    #[serde(default = "default_true")]
    pub serialize_account_access: bool,
    /// Optional run boundary in epoch milliseconds; loops stop at the first
    /// candle closing after it.
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            serialize_account_access: true,
            end_time: None,
        }
    }
}

// --- Structs for live.toml Configuration ---

/// The top-level configuration for a live or paper trading run.
#[derive(Deserialize, Debug, Clone)]
pub struct LiveConfig {
    #[serde(rename = "pairs")]
    pub pair_configs: Vec<PairConfig>,
}

impl LiveConfig {
    pub fn enabled_pairs(&self) -> impl Iterator<Item = &PairConfig> {
        self.pair_configs.iter().filter(|p| p.enabled)
    }
}

/// Configuration for a single trading pair.
#[derive(Deserialize, Debug, Clone)]
pub struct PairConfig {
    pub base: String,
    pub quote: String,
    pub interval: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub strategies: Vec<StrategyConfig>,
}

impl PairConfig {
    pub fn trading_pair(&self) -> TradingPair {
        TradingPair::new(&self.base, &self.quote)
    }

    pub fn interval(&self) -> Result<Interval> {
        self.interval.parse().map_err(|e: core_types::Error| Error::InvalidPair {
            pair: format!("{}/{}", self.base, self.quote),
            reason: e.to_string(),
        })
    }
}

/// Helper functions for serde defaults
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_live_config() {
        let content = r#"
            [[pairs]]
            base = "btc"
            quote = "usdt"
            interval = "15m"
            strategies = [
                { name = "ma_crossover", params = { fast_period = 9, slow_period = 21 } },
            ]

            [[pairs]]
            base = "ETH"
            quote = "USDT"
            interval = "1h"
            enabled = false
            strategies = []
        "#;
        let config: LiveConfig = toml::from_str(content).unwrap();

        assert_eq!(config.pair_configs.len(), 2);
        let enabled: Vec<_> = config.enabled_pairs().collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].trading_pair(), TradingPair::new("BTC", "USDT"));
        assert_eq!(enabled[0].interval().unwrap(), Interval::FifteenMinutes);
        assert_eq!(enabled[0].strategies[0].name, "ma_crossover");
    }

    #[test]
    fn bad_interval_names_the_pair() {
        let pair = PairConfig {
            base: "BTC".to_string(),
            quote: "USDT".to_string(),
            interval: "7m".to_string(),
            enabled: true,
            strategies: vec![],
        };
        let err = pair.interval().unwrap_err();
        assert!(err.to_string().contains("BTC/USDT"));
    }

    #[test]
    fn engine_settings_default_to_serialized_access() {
        let settings: EngineSettings = toml::from_str("").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert!(settings.serialize_account_access);
    }
}
