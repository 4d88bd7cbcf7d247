//! Type-keyed service registry.
//!
//! Each capability type maps to exactly one shared instance. Capabilities can be
//! concrete types or trait objects (`register::<dyn AudioPlayer>(...)`). Once the
//! boot phase locks the registry, every further registration fails.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use hearth_protocols::RegistryError;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

/// A registered instance as returned by [`ServiceRegistry::all`].
#[derive(Clone)]
pub struct ServiceHandle {
    name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceHandle {
    /// Type name of the capability the instance was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Recover the instance if it was registered under capability `T`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instance.downcast_ref::<Arc<T>>().cloned()
    }
}

#[derive(Default)]
struct RegistryState {
    services: HashMap<TypeId, ServiceHandle>,
    locked: bool,
}

/// Thread-safe registry of singleton services keyed by capability type.
///
/// Reads may run concurrently with each other but never overlap a write.
#[derive(Default)]
pub struct ServiceRegistry {
    state: RwLock<RegistryState>,
}

impl ServiceRegistry {
    /// Create an empty, unlocked registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under capability `T`.
    ///
    /// Fails with [`RegistryError::RegistrationLocked`] after [`lock`](Self::lock)
    /// and with [`RegistryError::AlreadyRegistered`] if `T` is already present.
    pub fn register<T>(&self, instance: Arc<T>) -> Result<(), RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = std::any::type_name::<T>();
        let mut state = self.state.write();

        if state.locked {
            return Err(RegistryError::RegistrationLocked(name));
        }
        if state.services.contains_key(&TypeId::of::<T>()) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        state.services.insert(
            TypeId::of::<T>(),
            ServiceHandle {
                name,
                instance: Arc::new(instance),
            },
        );
        debug!(service = name, "Registered service");
        Ok(())
    }

    /// Resolve the instance registered under `T`.
    pub fn resolve<T>(&self) -> Result<Arc<T>, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.try_resolve::<T>()
            .ok_or(RegistryError::NotRegistered(std::any::type_name::<T>()))
    }

    /// Resolve the instance registered under `T`, if any.
    pub fn try_resolve<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.state
            .read()
            .services
            .get(&TypeId::of::<T>())
            .and_then(|handle| handle.downcast::<T>())
    }

    /// Forbid any further registration. Idempotent and never undone.
    pub fn lock(&self) {
        let mut state = self.state.write();
        if !state.locked {
            state.locked = true;
            debug!(services = state.services.len(), "Service registration locked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.read().locked
    }

    /// Snapshot of all registered instances, in unspecified order.
    pub fn all(&self) -> Vec<ServiceHandle> {
        self.state.read().services.values().cloned().collect()
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.state.read().services.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.state.read().services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().services.is_empty()
    }

    /// Drop every registered instance. The lock stays in place.
    pub fn dispose(&self) {
        self.state.write().services.clear();
    }
}
