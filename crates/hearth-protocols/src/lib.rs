//! # Hearth Protocols
//!
//! Contract definitions for the Hearth lifecycle kernel.
//! Contains only interface definitions and shared value types - no implementations.
//!
//! ## Core Traits
//!
//! - [`GameService`] - A unit driven through ordered startup and shutdown
//! - [`Command`] - A unit of work executed by the command processor
//! - [`Event`] - Marker for values published on the event bus
//!
//! ## Shared Types
//!
//! - [`LifecyclePhase`] - Coarse application phases
//! - [`GameStateChanged`] / [`ServiceInitializationFailed`] - Events produced by the kernel

pub mod command;
pub mod error;
pub mod event;
pub mod phase;
pub mod service;

pub use command::Command;
pub use error::{CommandError, HandlerError, LifecycleError, RegistryError, ServiceError};
pub use event::{Event, GameStateChanged, ServiceInitializationFailed};
pub use phase::LifecyclePhase;
pub use service::{priority, GameService};

/// Cancellation token threaded through every asynchronous contract point.
pub use tokio_util::sync::CancellationToken;
