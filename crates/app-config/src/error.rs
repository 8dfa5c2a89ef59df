// In crates/app-config/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid risk configuration: {0}")]
    InvalidRisk(#[from] risk::Error),

    #[error("Invalid pair '{pair}': {reason}")]
    InvalidPair { pair: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
