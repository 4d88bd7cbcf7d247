//! Type-keyed publish/subscribe.
//!
//! Two delivery paths:
//! - [`EventBus::publish`] delivers in subscription order, marshalled onto the
//!   designated thread through the [`MainThreadDispatcher`] while the host is
//!   running and inline on the caller otherwise.
//! - [`EventBus::publish_async`] fans out across blocking workers bounded by
//!   the configured parallelism and stops on cancellation.
//!
//! A handler that returns an error or panics is logged; delivery to its
//! siblings continues.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use hearth_protocols::{Event, HandlerError};

use crate::dispatcher::MainThreadDispatcher;
use crate::panic::panic_message;

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;

type HandlerFn<E> = dyn Fn(&E) -> Result<(), HandlerError> + Send + Sync;

/// A subscription callback for events of kind `E`.
///
/// Handlers compare by reference: clones of one handler are equal, two
/// handlers built from identical closures are not. Keep the value returned
/// by [`EventBus::subscribe_fn`] to unsubscribe later.
pub struct EventHandler<E> {
    callback: Arc<HandlerFn<E>>,
}

impl<E: Event> EventHandler<E> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Reference equality on the underlying callback.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }

    fn call(&self, event: &E) -> Result<(), HandlerError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(event))) {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl<E> Clone for EventHandler<E> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E> fmt::Debug for EventHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum Delivery {
    Inline,
    Marshalled,
    FanOut,
}

fn invoke<E: Event>(handler: &EventHandler<E>, event: &E, delivery: Delivery) {
    if let Err(e) = handler.call(event) {
        error!(
            event = std::any::type_name::<E>(),
            delivery = ?delivery,
            error = %e,
            "Event handler failed"
        );
    }
}

/// Multicast event bus keyed by the concrete event type.
pub struct EventBus {
    /// `TypeId::of::<E>()` -> `Vec<EventHandler<E>>`
    handlers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    dispatcher: Option<MainThreadDispatcher>,
    shutdown: CancellationToken,
    parallelism: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Bus without a dispatcher: synchronous publishes always run inline.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            dispatcher: None,
            shutdown: CancellationToken::new(),
            parallelism: default_parallelism(),
        }
    }

    /// Bus that marshals synchronous publishes through `dispatcher` while the host runs.
    pub fn with_dispatcher(dispatcher: MainThreadDispatcher) -> Self {
        Self {
            dispatcher: Some(dispatcher),
            ..Self::new()
        }
    }

    /// Override the fan-out width of [`publish_async`](Self::publish_async). Clamped to at least 1.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Append `handler` to the list for `E`. Duplicates are kept and invoked twice.
    pub fn subscribe<E: Event>(&self, handler: EventHandler<E>) {
        let mut handlers = self.handlers.write();
        let list = handlers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<EventHandler<E>>::new()));
        if let Some(list) = list.downcast_mut::<Vec<EventHandler<E>>>() {
            list.push(handler);
        }
    }

    /// Subscribe a closure and return the handler needed to unsubscribe it.
    pub fn subscribe_fn<E, F>(&self, callback: F) -> EventHandler<E>
    where
        E: Event,
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let handler = EventHandler::new(callback);
        self.subscribe(handler.clone());
        handler
    }

    /// Remove the first subscription matching `handler` by reference. Absent is a no-op.
    pub fn unsubscribe<E: Event>(&self, handler: &EventHandler<E>) {
        let mut handlers = self.handlers.write();
        let key = TypeId::of::<E>();

        let now_empty = match handlers
            .get_mut(&key)
            .and_then(|list| list.downcast_mut::<Vec<EventHandler<E>>>())
        {
            Some(list) => {
                if let Some(index) = list.iter().position(|h| h.ptr_eq(handler)) {
                    list.remove(index);
                }
                list.is_empty()
            }
            None => false,
        };

        if now_empty {
            handlers.remove(&key);
        }
    }

    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.handlers
            .read()
            .get(&TypeId::of::<E>())
            .and_then(|list| list.downcast_ref::<Vec<EventHandler<E>>>())
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every current subscriber in subscription order.
    ///
    /// While the dispatcher reports the host running, delivery is queued for
    /// the next drain; otherwise handlers run before this call returns.
    pub fn publish<E: Event>(&self, event: E) {
        let handlers = self.snapshot::<E>();
        if handlers.is_empty() {
            return;
        }

        match &self.dispatcher {
            Some(dispatcher) if dispatcher.is_host_running() => {
                debug!(
                    event = std::any::type_name::<E>(),
                    handlers = handlers.len(),
                    "Marshalling event to main thread"
                );
                dispatcher.enqueue(move || {
                    for handler in &handlers {
                        invoke(handler, &event, Delivery::Marshalled);
                    }
                });
            }
            _ => {
                for handler in &handlers {
                    invoke(handler, &event, Delivery::Inline);
                }
            }
        }
    }

    /// Deliver `event` to every current subscriber concurrently.
    ///
    /// Returns once every started handler finished, or as soon as either
    /// `cancel` or the bus's own shutdown signal fires. Handlers not yet
    /// started at that point are skipped. Cancellation is not an error.
    pub async fn publish_async<E: Event>(&self, event: E, cancel: &CancellationToken) {
        let handlers = self.snapshot::<E>();
        if handlers.is_empty() {
            return;
        }

        let event = Arc::new(event);
        let permits = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for handler in handlers {
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = cancel.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let event = Arc::clone(&event);
            let shutdown = self.shutdown.clone();
            let cancel = cancel.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                if shutdown.is_cancelled() || cancel.is_cancelled() {
                    return;
                }
                invoke(&handler, &event, Delivery::FanOut);
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = cancel.cancelled() => break,
                joined = tasks.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => error!(
                        event = std::any::type_name::<E>(),
                        error = %e,
                        "Fan-out task failed"
                    ),
                    None => return,
                },
            }
        }

        debug!(
            event = std::any::type_name::<E>(),
            "Fan-out cancelled"
        );
    }

    /// Abort in-flight fan-outs and drop every subscription. Shutdown only.
    pub fn dispose(&self) {
        self.shutdown.cancel();
        self.handlers.write().clear();
    }

    fn snapshot<E: Event>(&self) -> Vec<EventHandler<E>> {
        self.handlers
            .read()
            .get(&TypeId::of::<E>())
            .and_then(|list| list.downcast_ref::<Vec<EventHandler<E>>>())
            .cloned()
            .unwrap_or_default()
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, usize::from)
}
