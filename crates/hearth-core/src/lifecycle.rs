//! Application lifecycle orchestration.
//!
//! The [`LifecycleOrchestrator`] owns the phase state machine and drives the
//! declared services through ordered startup and reverse-ordered shutdown:
//!
//! ```text
//! Boot -> (register core, instantiate declarations, lock registry)
//!      -> initialize services by ascending priority
//!      -> initialize config facade
//!      -> MainMenu <-> Loading <-> Gameplay <-> Paused
//!      -> Shutdown (terminal; services stopped in reverse order)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hearth_config::{ConfigManager, HearthSettings};
use hearth_protocols::{
    GameService, GameStateChanged, LifecycleError, LifecyclePhase, ServiceError,
    ServiceInitializationFailed,
};

use crate::declaration::{ServiceBinder, ServiceDeclaration};
use crate::dispatcher::MainThreadDispatcher;
use crate::event_bus::EventBus;
use crate::host::{HostSignal, TimeScale};
use crate::panic::panic_message;
use crate::registry::ServiceRegistry;

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

type StateListener = Arc<dyn Fn(LifecyclePhase, LifecyclePhase) + Send + Sync>;

/// Builder for [`LifecycleOrchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    dispatcher: Option<MainThreadDispatcher>,
    config: Option<Arc<ConfigManager>>,
    declarations: Vec<ServiceDeclaration>,
    parallelism: Option<usize>,
    service_shutdown_timeout: Option<Duration>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing dispatcher with the host loop.
    pub fn dispatcher(mut self, dispatcher: MainThreadDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn config(mut self, config: Arc<ConfigManager>) -> Self {
        self.config = Some(config);
        self
    }

    /// Append a service declaration. Declaration order breaks priority ties.
    pub fn declare(mut self, declaration: ServiceDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn service_shutdown_timeout(mut self, limit: Duration) -> Self {
        self.service_shutdown_timeout = Some(limit);
        self
    }

    /// Apply event, lifecycle and config settings.
    ///
    /// An explicitly supplied config manager is kept as is.
    pub fn with_settings(mut self, settings: &HearthSettings) -> Self {
        self.parallelism = Some(settings.events.parallelism());
        self.service_shutdown_timeout = settings.lifecycle.service_shutdown_timeout();
        if self.config.is_none() {
            self.config = Some(Arc::new(ConfigManager::with_settings(&settings.config)));
        }
        self
    }

    pub fn build(self) -> Arc<LifecycleOrchestrator> {
        let dispatcher = self.dispatcher.unwrap_or_default();
        let mut event_bus = EventBus::with_dispatcher(dispatcher.clone());
        if let Some(parallelism) = self.parallelism {
            event_bus = event_bus.with_parallelism(parallelism);
        }
        let config = self.config.unwrap_or_default();

        Arc::new_cyclic(|self_ref| LifecycleOrchestrator {
            self_ref: self_ref.clone(),
            phase: AtomicU8::new(LifecyclePhase::Boot as u8),
            registry: Arc::new(ServiceRegistry::new()),
            event_bus: Arc::new(event_bus),
            dispatcher,
            config,
            time_scale: TimeScale::default(),
            host_signal: HostSignal::new(),
            shutdown_token: CancellationToken::new(),
            services: RwLock::new(Vec::new()),
            declarations: Mutex::new(self.declarations),
            state_listeners: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
            teardown_started: AtomicBool::new(false),
            service_shutdown_timeout: self.service_shutdown_timeout,
        })
    }
}

/// Phase state machine and service lifecycle driver.
pub struct LifecycleOrchestrator {
    self_ref: Weak<LifecycleOrchestrator>,
    phase: AtomicU8,
    registry: Arc<ServiceRegistry>,
    event_bus: Arc<EventBus>,
    dispatcher: MainThreadDispatcher,
    config: Arc<ConfigManager>,
    time_scale: TimeScale,
    host_signal: HostSignal,
    shutdown_token: CancellationToken,
    /// Successfully initialized services, in initialization order.
    services: RwLock<Vec<Arc<dyn GameService>>>,
    declarations: Mutex<Vec<ServiceDeclaration>>,
    state_listeners: RwLock<Vec<StateListener>>,
    started: AtomicBool,
    teardown_started: AtomicBool,
    service_shutdown_timeout: Option<Duration>,
}

impl LifecycleOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn current_phase(&self) -> LifecyclePhase {
        LifecyclePhase::from(self.phase.load(Ordering::Acquire))
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    pub fn dispatcher(&self) -> &MainThreadDispatcher {
        &self.dispatcher
    }

    pub fn time_scale(&self) -> &TimeScale {
        &self.time_scale
    }

    pub fn host_signal(&self) -> &HostSignal {
        &self.host_signal
    }

    /// Raised when shutdown begins. Never reset.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Register an in-process callback fired with `(previous, new)` on every
    /// effective transition, before the `GameStateChanged` event is published.
    pub fn on_state_changed<F>(&self, listener: F)
    where
        F: Fn(LifecyclePhase, LifecyclePhase) + Send + Sync + 'static,
    {
        self.state_listeners.write().push(Arc::new(listener));
    }

    /// Run the startup protocol.
    ///
    /// On a service initialization failure a [`ServiceInitializationFailed`]
    /// event is published, the phase moves to `MainMenu` and the error is
    /// still returned. Services initialized before the failure stay up and
    /// are stopped by [`shutdown`](Self::shutdown).
    ///
    /// The registry is locked once the declared factories have run, whether
    /// or not they succeeded. If shutdown begins while startup is still
    /// initializing, startup stops early with
    /// [`LifecycleError::ShutdownInProgress`]; a service that finishes
    /// initializing after that point is shut down right away.
    ///
    /// The orchestrator registers itself in its own registry, so the
    /// resulting reference cycle is only broken by [`shutdown`](Self::shutdown).
    /// Call it after a failed start as well.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(LifecycleError::AlreadyStarted);
        }
        if self.is_tearing_down() {
            return Err(LifecycleError::ShutdownInProgress);
        }
        info!("Lifecycle starting");

        let instantiated = self
            .register_core()
            .and_then(|()| self.instantiate_declarations());
        self.registry.lock();
        let mut services = instantiated?;

        // Stable: equal priorities keep declaration order.
        services.sort_by_key(|service| service.priority());

        for service in services {
            if self.is_tearing_down() {
                return Err(self.abort_startup());
            }

            let name = service.name();
            info!(service = name, priority = service.priority(), "Initializing service");
            if let Err(e) = service.initialize(&self.shutdown_token).await {
                return Err(self.fail_startup(name, e));
            }

            if !self.adopt(&service) {
                warn!(service = name, "Shutdown began during initialization, stopping service");
                if let Err(e) = self.stop_service(service.as_ref()).await {
                    warn!(service = name, error = %e, "Service shutdown failed");
                }
                return Err(self.abort_startup());
            }
        }

        if self.is_tearing_down() {
            return Err(self.abort_startup());
        }
        if let Err(e) = self.config.initialize(&self.shutdown_token).await {
            return Err(self.fail_startup(self.config.name(), e));
        }
        if self.is_tearing_down() {
            if let Err(e) = self.stop_service(self.config.as_ref()).await {
                warn!(service = self.config.name(), error = %e, "Service shutdown failed");
            }
            return Err(self.abort_startup());
        }

        self.transition_to(LifecyclePhase::MainMenu);
        info!(services = self.services.read().len(), "Lifecycle started");
        Ok(())
    }

    /// Move to `phase`. Returns `false` when nothing happened.
    ///
    /// Same-phase requests are no-ops and `Shutdown` is never left. Entering
    /// `Shutdown` starts the shutdown protocol on the current Tokio runtime.
    pub fn transition_to(&self, phase: LifecyclePhase) -> bool {
        let previous = loop {
            let current = self.current_phase();
            if current == phase {
                return false;
            }
            if current.is_terminal() {
                warn!(phase = %phase, "Ignoring transition out of shutdown");
                return false;
            }
            if self
                .phase
                .compare_exchange(current as u8, phase as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break current;
            }
        };

        info!(from = %previous, to = %phase, "Phase transition");
        self.notify_listeners(previous, phase);
        self.event_bus.publish(GameStateChanged {
            previous_phase: previous,
            new_phase: phase,
        });

        match phase {
            LifecyclePhase::Gameplay => self.time_scale.set(1.0),
            LifecyclePhase::Paused => self.time_scale.set(0.0),
            LifecyclePhase::Shutdown => self.begin_teardown(),
            _ => {}
        }
        true
    }

    /// `Gameplay -> Paused`; no-op in any other phase.
    pub fn suspend(&self) -> bool {
        self.current_phase() == LifecyclePhase::Gameplay
            && self.transition_to(LifecyclePhase::Paused)
    }

    /// `Paused -> Gameplay`; no-op in any other phase.
    pub fn resume(&self) -> bool {
        self.current_phase() == LifecyclePhase::Paused
            && self.transition_to(LifecyclePhase::Gameplay)
    }

    /// Run the shutdown protocol. Idempotent.
    ///
    /// Services are stopped in reverse initialization order with the raised
    /// shutdown token; failures and timeouts are logged and skipped. The
    /// config facade goes last, then the registry and bus are disposed and
    /// the host signal is raised.
    pub async fn shutdown(&self) {
        if self.teardown_started.swap(true, Ordering::AcqRel) {
            debug!("Shutdown already in progress");
            return;
        }
        info!("Lifecycle shutting down");

        self.transition_to(LifecyclePhase::Shutdown);
        self.shutdown_token.cancel();

        let services = std::mem::take(&mut *self.services.write());
        for service in services.iter().rev() {
            let name = service.name();
            match self.stop_service(service.as_ref()).await {
                Ok(()) => debug!(service = name, "Service stopped"),
                Err(e) => warn!(service = name, error = %e, "Service shutdown failed"),
            }
        }

        if let Err(e) = self.stop_service(self.config.as_ref()).await {
            warn!(service = self.config.name(), error = %e, "Service shutdown failed");
        }

        self.registry.dispose();
        self.event_bus.dispose();
        self.host_signal.raise();
        info!("Lifecycle stopped");
    }

    async fn stop_service(&self, service: &dyn GameService) -> Result<(), ServiceError> {
        match self.service_shutdown_timeout {
            Some(limit) => timeout(limit, service.shutdown(&self.shutdown_token))
                .await
                .unwrap_or(Err(ServiceError::Timeout)),
            None => service.shutdown(&self.shutdown_token).await,
        }
    }

    /// Teardown may have disposed the registry before core services were
    /// registered into it; clear it again so nothing outlives the abort.
    fn abort_startup(&self) -> LifecycleError {
        self.registry.dispose();
        LifecycleError::ShutdownInProgress
    }

    fn is_tearing_down(&self) -> bool {
        self.teardown_started.load(Ordering::Acquire)
    }

    /// Record an initialized service for teardown. Returns `false` once
    /// teardown has started; the flag is checked under the list lock that
    /// teardown takes the list with.
    fn adopt(&self, service: &Arc<dyn GameService>) -> bool {
        let mut services = self.services.write();
        if self.is_tearing_down() {
            return false;
        }
        services.push(Arc::clone(service));
        true
    }

    fn instantiate_declarations(&self) -> Result<Vec<Arc<dyn GameService>>, LifecycleError> {
        let declarations = std::mem::take(&mut *self.declarations.lock());
        let binder = ServiceBinder::new(&self.registry);
        let mut services = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let name = declaration.name();
            let service = declaration.instantiate(&binder)?;
            debug!(service = name, priority = service.priority(), "Service instantiated");
            services.push(service);
        }
        Ok(services)
    }

    fn register_core(&self) -> Result<(), LifecycleError> {
        self.registry.register(Arc::clone(&self.registry))?;
        self.registry.register(Arc::clone(&self.event_bus))?;
        self.registry.register(Arc::clone(&self.config))?;
        self.registry.register(Arc::new(self.dispatcher.clone()))?;
        self.registry.register(Arc::new(self.time_scale.clone()))?;
        if let Some(this) = self.self_ref.upgrade() {
            self.registry.register(this)?;
        }
        Ok(())
    }

    fn fail_startup(&self, service: &'static str, error: ServiceError) -> LifecycleError {
        self.event_bus.publish(ServiceInitializationFailed {
            service_kind: service,
            error: error.clone(),
        });
        error!(service, error = %error, "Service failed to initialize");
        self.transition_to(LifecyclePhase::MainMenu);
        LifecycleError::ServiceInit {
            service,
            source: error,
        }
    }

    fn notify_listeners(&self, previous: LifecyclePhase, new: LifecyclePhase) {
        let listeners = self.state_listeners.read().clone();
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(previous, new))) {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "State listener panicked"
                );
            }
        }
    }

    fn begin_teardown(&self) {
        if self.is_tearing_down() {
            return;
        }
        match (Handle::try_current(), self.self_ref.upgrade()) {
            (Ok(runtime), Some(this)) => {
                runtime.spawn(async move { this.shutdown().await });
            }
            _ => warn!("No runtime available; shutdown must be awaited explicitly"),
        }
    }
}
