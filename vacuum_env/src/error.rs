//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A string could not be parsed as an environment identifier
    #[error("Invalid environment id: {0}")]
    InvalidId(String),

    /// The clock reported a time before the Unix epoch
    #[error("Clock error: {0}")]
    ClockError(String),
}

impl EnvError {
    /// Creates an invalid-id error.
    pub fn invalid_id(raw: impl Into<String>) -> Self {
        Self::InvalidId(raw.into())
    }

    /// Creates a clock error.
    pub fn clock(msg: impl std::fmt::Display) -> Self {
        Self::ClockError(msg.to_string())
    }
}
