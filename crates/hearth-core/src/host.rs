//! Host-facing state owned by the orchestrator: the time scale and the
//! termination signal.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;

/// Shared simulation speed multiplier. `1.0` is real time, `0.0` is frozen.
#[derive(Debug, Clone)]
pub struct TimeScale {
    bits: Arc<AtomicU32>,
}

impl TimeScale {
    pub fn new(scale: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(scale.to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, scale: f32) {
        self.bits.store(scale.to_bits(), Ordering::Release);
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// One-shot signal telling the host loop to exit.
///
/// Raised once the shutdown protocol has torn every service down.
#[derive(Clone)]
pub struct HostSignal {
    sender: broadcast::Sender<()>,
    raised: Arc<AtomicBool>,
}

impl HostSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            raised: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raise the signal. Later calls are ignored.
    pub fn raise(&self) {
        if !self.raised.swap(true, Ordering::AcqRel) {
            let _ = self.sender.send(());
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Resolve once the signal has been raised, including before this call.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        if self.is_raised() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for HostSignal {
    fn default() -> Self {
        Self::new()
    }
}
