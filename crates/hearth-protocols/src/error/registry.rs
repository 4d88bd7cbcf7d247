//! Service registry errors.

use thiserror::Error;

/// Misuse of the service registry.
///
/// These are programmer errors: they are surfaced immediately and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Service already registered: {0}")]
    AlreadyRegistered(&'static str),

    #[error("Service registration is locked after boot phase: {0}")]
    RegistrationLocked(&'static str),

    #[error("Service not registered: {0}")]
    NotRegistered(&'static str),
}
