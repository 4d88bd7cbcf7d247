//! Service lifecycle errors.

use thiserror::Error;

/// Failure of a service `initialize` or `shutdown` step.
///
/// Cloneable so the same failure can be published as an event and returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Service shutdown failed: {0}")]
    ShutdownFailed(String),

    #[error("Service operation cancelled")]
    Cancelled,

    #[error("Service operation timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Custom(String),
}
