// In crates/strategies/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid settings for strategy '{name}': {source}")]
    InvalidParams {
        name: String,
        source: toml::de::Error,
    },

    #[error("Invalid strategy settings: {0}")]
    InvalidSettings(String),

    #[error("Strategy used before initialization")]
    NotInitialized,

    #[error("Indicator error: {0}")]
    Indicator(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] exchange::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
