//! Event contract and the events produced by the kernel itself.

use crate::error::ServiceError;
use crate::phase::LifecyclePhase;

/// Marker for values that can travel over the event bus.
///
/// The bus keys subscriptions by the concrete type and never inspects payloads.
pub trait Event: Send + Sync + 'static {}

/// Published on every effective phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameStateChanged {
    pub previous_phase: LifecyclePhase,
    pub new_phase: LifecyclePhase,
}

impl Event for GameStateChanged {}

/// Published once when a service fails its `initialize` step.
#[derive(Debug, Clone)]
pub struct ServiceInitializationFailed {
    pub service_kind: &'static str,
    pub error: ServiceError,
}

impl Event for ServiceInitializationFailed {}
