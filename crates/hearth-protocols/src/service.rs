//! The service contract driven by the lifecycle orchestrator.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// A unit of application infrastructure with an asynchronous lifecycle.
///
/// Services are initialized in ascending [`priority`](GameService::priority)
/// order and shut down in exactly the reverse order.
#[async_trait]
pub trait GameService: Send + Sync {
    /// Human-readable kind used in logs and failure events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Initialization order; lower runs first.
    fn priority(&self) -> i32 {
        priority::DEFAULT
    }

    /// Bring the service up.
    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), ServiceError>;

    /// Tear the service down. `cancel` is already raised during orchestrated shutdown.
    async fn shutdown(&self, cancel: &CancellationToken) -> Result<(), ServiceError>;
}

/// Well-known initialization priorities (lower = starts earlier, stops later).
pub mod priority {
    pub const CONFIG: i32 = 10;
    pub const COMMANDS: i32 = 20;
    pub const PLATFORM: i32 = 50;
    pub const DEFAULT: i32 = 100;
    pub const GAMEPLAY: i32 = 200;
}
