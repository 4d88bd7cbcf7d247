//! Main-thread callback marshalling.
//!
//! Work arriving from any thread is queued and executed later, in FIFO order,
//! by whichever thread the host designates to call [`MainThreadDispatcher::drain`]
//! once per tick.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::panic::panic_message;

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct DispatcherInner {
    queue: Mutex<Vec<Callback>>,
    host_running: AtomicBool,
    owner: OnceLock<ThreadId>,
}

/// Cloneable handle to a shared callback queue.
#[derive(Clone)]
pub struct MainThreadDispatcher {
    inner: Arc<DispatcherInner>,
}

impl Default for MainThreadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadDispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                queue: Mutex::new(Vec::new()),
                host_running: AtomicBool::new(false),
                owner: OnceLock::new(),
            }),
        }
    }

    /// Queue `callback` for the next drain. Callable from any thread.
    pub fn enqueue<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.lock().push(Box::new(callback));
    }

    /// Run everything queued so far, in enqueue order, and return how many ran.
    ///
    /// The queue is swapped out under the lock, so callbacks enqueued while
    /// draining wait for the next call. A panicking callback is logged and
    /// the rest still run.
    pub fn drain(&self) -> usize {
        self.check_owner();

        let batch = std::mem::take(&mut *self.inner.queue.lock());
        let count = batch.len();

        for callback in batch {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "Main-thread callback panicked"
                );
            }
        }

        count
    }

    /// Number of callbacks waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether a host loop is currently draining this queue.
    ///
    /// The event bus only marshals synchronous publishes while this is set;
    /// otherwise nobody would ever run them.
    pub fn is_host_running(&self) -> bool {
        self.inner.host_running.load(Ordering::Acquire)
    }

    pub fn set_host_running(&self, running: bool) {
        self.inner.host_running.store(running, Ordering::Release);
    }

    fn check_owner(&self) {
        let current = thread::current().id();
        let owner = *self.inner.owner.get_or_init(|| current);
        if owner != current {
            warn!(
                owner = ?owner,
                current = ?current,
                "Dispatcher drained from a thread other than the first drainer"
            );
        }
    }
}
