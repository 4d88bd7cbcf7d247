//! Serialized command queue.
//!
//! Commands run strictly one at a time in enqueue order. Enqueuing starts a
//! drain task only when none is active; the task exits when the queue is
//! empty or cancellation is requested.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearth_config::CommandSettings;
use hearth_protocols::{priority, Command, CommandError, GameService, ServiceError};

use crate::panic::panic_message;

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Box<dyn Command>>,
    processing: bool,
    cancel: Option<CancellationToken>,
}

struct ProcessorInner {
    state: Mutex<QueueState>,
    poll_interval: Duration,
}

/// FIFO queue of asynchronous commands with at most one in flight.
pub struct CommandProcessor {
    inner: Arc<ProcessorInner>,
    runtime: Option<Handle>,
}

impl CommandProcessor {
    /// Create a processor whose drain tasks run on the current Tokio runtime.
    ///
    /// Outside a runtime, the runtime is picked up by the first enqueue made
    /// from inside one; until then commands only queue.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                state: Mutex::new(QueueState::default()),
                poll_interval,
            }),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn with_settings(settings: &CommandSettings) -> Self {
        Self::new(settings.shutdown_poll_interval())
    }

    /// Append `command`, starting a drain task if none is active.
    pub fn enqueue<C: Command + 'static>(&self, command: C) {
        self.enqueue_boxed(Box::new(command));
    }

    pub fn enqueue_boxed(&self, command: Box<dyn Command>) {
        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());
        let cancel = {
            let mut state = self.inner.state.lock();
            debug!(command = command.name(), "Command enqueued");
            state.pending.push_back(command);
            if state.processing {
                return;
            }
            if runtime.is_none() {
                warn!(
                    pending = state.pending.len(),
                    "No runtime available; command stays queued"
                );
                return;
            }
            let token = CancellationToken::new();
            state.processing = true;
            state.cancel = Some(token.clone());
            token
        };

        if let Some(runtime) = runtime {
            let inner = Arc::clone(&self.inner);
            runtime.spawn(inner.drain(cancel));
        }
    }

    /// Whether a drain task is active.
    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().processing
    }

    /// Commands waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Cancel the active drain and wait until it has exited.
    ///
    /// The command in flight observes the cancellation through its token;
    /// commands still queued stay queued and a later enqueue resumes them.
    pub async fn stop(&self) {
        let active = self.inner.state.lock().cancel.clone();
        if let Some(token) = active {
            token.cancel();
        }

        while self.is_processing() {
            tokio::time::sleep(self.inner.poll_interval).await;
        }
        debug!("Command processor stopped");
    }
}

impl ProcessorInner {
    async fn drain(self: Arc<Self>, cancel: CancellationToken) {
        let mut guard = ProcessingGuard {
            inner: &self,
            armed: true,
        };

        loop {
            let command = {
                let mut state = self.state.lock();
                let next = if cancel.is_cancelled() {
                    None
                } else {
                    state.pending.pop_front()
                };
                match next {
                    Some(command) => command,
                    None => {
                        state.processing = false;
                        state.cancel = None;
                        guard.armed = false;
                        return;
                    }
                }
            };

            if !command.can_execute() {
                debug!(command = command.name(), "Command skipped");
                continue;
            }

            let outcome = AssertUnwindSafe(command.execute(&cancel))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(CommandError::ExecutionFailed(format!(
                        "panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });

            if let Err(e) = outcome {
                warn!(command = command.name(), error = %e, "Command failed");
                command.on_failure(e);
            }
        }
    }
}

/// Clears the processing flag if a drain task unwinds.
struct ProcessingGuard<'a> {
    inner: &'a ProcessorInner,
    armed: bool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.state.lock();
            state.processing = false;
            state.cancel = None;
        }
    }
}

#[async_trait]
impl GameService for CommandProcessor {
    fn name(&self) -> &'static str {
        "CommandProcessor"
    }

    fn priority(&self) -> i32 {
        priority::COMMANDS
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        info!("Command processor ready");
        Ok(())
    }

    /// Ignores `cancel` and always waits for the active drain to exit.
    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        self.stop().await;
        Ok(())
    }
}
