//! Orchestrator errors.

use thiserror::Error;

use super::{RegistryError, ServiceError};

/// Failure of the startup protocol.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Service {service} failed to initialize: {source}")]
    ServiceInit {
        service: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("Lifecycle already started")]
    AlreadyStarted,

    #[error("Startup aborted: shutdown in progress")]
    ShutdownInProgress,
}
