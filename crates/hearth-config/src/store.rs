//! Type-keyed storage for registered config objects.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::ConfigError;
use crate::game_config::GameConfig;

/// Shared, in-place mutable handle to a registered config.
pub struct ConfigHandle<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> ConfigHandle<T> {
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    /// Whether both handles point at the same registered instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for ConfigHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Type-erased view used by override adapters that address configs by id.
trait ErasedConfig: Send + Sync {
    fn config_id(&self) -> String;
    fn remote_overrides_enabled(&self) -> bool;
    fn merge_overrides(&self, patch: &toml::Table) -> Result<bool, ConfigError>;
}

impl<T: GameConfig> ErasedConfig for RwLock<T> {
    fn config_id(&self) -> String {
        self.read().meta().config_id.clone()
    }

    fn remote_overrides_enabled(&self) -> bool {
        self.read().meta().enable_remote_overrides
    }

    fn merge_overrides(&self, patch: &toml::Table) -> Result<bool, ConfigError> {
        let mut config = self.write();
        let merged = config.merge_overrides(patch)?;
        if merged {
            config.apply_remote_overrides();
        }
        Ok(merged)
    }
}

struct StoredConfig {
    erased: Arc<dyn ErasedConfig>,
    typed: Arc<dyn Any + Send + Sync>,
}

/// Type-keyed config storage, one instance per concrete config type.
#[derive(Default)]
pub struct ConfigStore {
    entries: DashMap<TypeId, StoredConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a config under its concrete type.
    pub fn insert<T: GameConfig>(&self, config: T) -> Result<ConfigHandle<T>, ConfigError> {
        match self.entries.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(ConfigError::AlreadyRegistered(std::any::type_name::<T>())),
            Entry::Vacant(slot) => {
                let cell = Arc::new(RwLock::new(config));
                slot.insert(StoredConfig {
                    erased: cell.clone(),
                    typed: cell.clone(),
                });
                Ok(ConfigHandle { inner: cell })
            }
        }
    }

    /// Look up the config registered for `T`.
    pub fn get<T: GameConfig>(&self) -> Option<ConfigHandle<T>> {
        let typed = self.entries.get(&TypeId::of::<T>())?.typed.clone();
        typed
            .downcast::<RwLock<T>>()
            .ok()
            .map(|inner| ConfigHandle { inner })
    }

    pub fn contains<T: GameConfig>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Ids of all registered configs.
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.value().erased.config_id())
            .collect()
    }

    /// Merge `patch` into every config whose id is `config_id` and that allows overrides.
    ///
    /// Returns the number of configs changed.
    pub fn merge_by_id(&self, config_id: &str, patch: &toml::Table) -> Result<usize, ConfigError> {
        let targets: Vec<Arc<dyn ErasedConfig>> = self
            .entries
            .iter()
            .map(|entry| entry.value().erased.clone())
            .filter(|config| config.config_id() == config_id)
            .collect();

        let mut merged = 0;
        for config in targets {
            if !config.remote_overrides_enabled() {
                debug!(config_id, "Remote overrides disabled, skipping");
                continue;
            }
            if config.merge_overrides(patch)? {
                merged += 1;
            }
        }
        Ok(merged)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
