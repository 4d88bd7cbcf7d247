//! # Hearth Core
//!
//! Application-lifecycle and service-orchestration kernel.
//!
//! ## Components
//!
//! - [`ServiceRegistry`] - Type-keyed singleton store, locked after boot
//! - [`MainThreadDispatcher`] - Per-tick callback queue drained on the designated thread
//! - [`EventBus`] - Type-keyed publish/subscribe with marshalled and fan-out delivery
//! - [`LifecycleOrchestrator`] - Phase state machine driving ordered startup and shutdown
//! - [`CommandProcessor`] - Serialized FIFO queue of asynchronous commands

pub mod commands;
pub mod declaration;
pub mod dispatcher;
pub mod event_bus;
pub mod host;
pub mod lifecycle;
pub mod registry;

mod panic;

pub use commands::CommandProcessor;
pub use declaration::{ServiceBinder, ServiceDeclaration};
pub use dispatcher::MainThreadDispatcher;
pub use event_bus::{EventBus, EventHandler};
pub use host::{HostSignal, TimeScale};
pub use lifecycle::{LifecycleOrchestrator, OrchestratorBuilder};
pub use registry::{ServiceHandle, ServiceRegistry};
