//! Explicit service declarations.
//!
//! A declaration pairs a service name with a factory. The factory builds the
//! service and binds every capability it should be resolvable under, so the
//! set of registrations is fixed at compile time.

use std::sync::Arc;

use hearth_protocols::{GameService, RegistryError};

use crate::registry::ServiceRegistry;

type ServiceFactory =
    Box<dyn FnOnce(&ServiceBinder<'_>) -> Result<Arc<dyn GameService>, RegistryError> + Send>;

/// A service to instantiate during the startup protocol.
pub struct ServiceDeclaration {
    name: &'static str,
    factory: ServiceFactory,
}

impl ServiceDeclaration {
    /// Declare a service with a custom factory.
    ///
    /// The factory receives a [`ServiceBinder`] for registering capabilities
    /// (for example `binder.bind::<dyn SaveSystem>(service.clone())`) and for
    /// resolving services bound earlier.
    pub fn new<F>(name: &'static str, factory: F) -> Self
    where
        F: FnOnce(&ServiceBinder<'_>) -> Result<Arc<dyn GameService>, RegistryError>
            + Send
            + 'static,
    {
        Self {
            name,
            factory: Box::new(factory),
        }
    }

    /// Declare a service resolvable under its concrete type only.
    pub fn of<S, F>(factory: F) -> Self
    where
        S: GameService + 'static,
        F: FnOnce() -> S + Send + 'static,
    {
        Self::new(std::any::type_name::<S>(), move |binder| {
            let service = Arc::new(factory());
            binder.bind(service.clone())?;
            let service: Arc<dyn GameService> = service;
            Ok(service)
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn instantiate(
        self,
        binder: &ServiceBinder<'_>,
    ) -> Result<Arc<dyn GameService>, RegistryError> {
        (self.factory)(binder)
    }
}

/// Capability registration handle passed to service factories.
pub struct ServiceBinder<'a> {
    registry: &'a ServiceRegistry,
}

impl<'a> ServiceBinder<'a> {
    pub fn new(registry: &'a ServiceRegistry) -> Self {
        Self { registry }
    }

    /// Register `instance` under capability `T`.
    pub fn bind<T>(&self, instance: Arc<T>) -> Result<(), RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.registry.register(instance)
    }

    /// Resolve a capability registered before this factory ran.
    pub fn resolve<T>(&self) -> Result<Arc<T>, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.registry.resolve()
    }
}
