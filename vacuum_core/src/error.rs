//! Error taxonomy for the simulation core.
//!
//! Every variant is recoverable by the caller and none of them leaves shared
//! state modified: validation happens before any mutation.

use thiserror::Error;
use vacuum_env::EnvironmentId;

/// Errors returned by grid worlds, the action engine and the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed creation or action request
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unknown environment identifier
    #[error("Environment not found: {0}")]
    NotFound(EnvironmentId),

    /// Action submitted after the environment terminated
    #[error("Environment {0} is finished")]
    EnvironmentFinished(EnvironmentId),

    /// Global view requested on a restricted environment
    #[error("Global state of environment {0} is restricted")]
    Restricted(EnvironmentId),
}

impl CoreError {
    /// Creates an invalid-parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
