//! Event handler errors.

use thiserror::Error;

/// Failure raised by an event subscriber during dispatch.
///
/// Contained per handler: logged by the bus, never propagated to the publisher.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Custom(String),
}

impl HandlerError {
    /// Shorthand for a custom handler failure.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}
