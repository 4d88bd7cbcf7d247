//! Error types for the Hearth protocol layer.

mod command;
mod handler;
mod lifecycle;
mod registry;
mod service;

pub use command::*;
pub use handler::*;
pub use lifecycle::*;
pub use registry::*;
pub use service::*;
