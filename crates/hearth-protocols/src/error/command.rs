//! Command execution errors.

use thiserror::Error;

/// Failure of a single command.
///
/// Routed to the command's own `on_failure`; the queue continues with the next command.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Command cancelled")]
    Cancelled,

    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_failed_error() {
        let err = CommandError::ExecutionFailed("disk full".to_string());
        let display = err.to_string();
        assert!(display.contains("execution failed"));
        assert!(display.contains("disk full"));
    }

    #[test]
    fn test_cancelled_error() {
        assert!(CommandError::Cancelled.to_string().contains("cancelled"));
    }

    #[test]
    fn test_custom_error() {
        let err = CommandError::Custom("custom".to_string());
        assert_eq!(err.to_string(), "custom");
    }
}
