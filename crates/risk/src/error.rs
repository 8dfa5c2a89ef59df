// In crates/risk/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid risk parameter `{field}`: {reason}")]
    InvalidParameters { field: &'static str, reason: String },

    #[error("Exchange request failed: {0}")]
    Exchange(#[from] exchange::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
