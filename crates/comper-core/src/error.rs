//! Error types for comper

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComperError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ComperError>;

pub(crate) fn invalid(msg: impl Into<String>) -> ComperError {
    ComperError::InvalidInput(msg.into())
}
