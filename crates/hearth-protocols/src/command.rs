//! The command contract consumed by the command processor.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CommandError;

/// An asynchronous unit of work queued for strictly serialized execution.
#[async_trait]
pub trait Command: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Checked right before execution; `false` drops the command silently.
    fn can_execute(&self) -> bool {
        true
    }

    /// Run the command.
    async fn execute(&self, cancel: &CancellationToken) -> Result<(), CommandError>;

    /// Receives any error returned by [`execute`](Command::execute).
    fn on_failure(&self, error: CommandError);
}
