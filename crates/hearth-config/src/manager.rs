//! Config registry service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use hearth_protocols::{priority, GameService, ServiceError};

use crate::adapter::RemoteConfigAdapter;
use crate::error::ConfigError;
use crate::game_config::GameConfig;
use crate::settings::OverrideSettings;
use crate::store::{ConfigHandle, ConfigStore};

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

/// Type-keyed registry of game configs with an optional remote-override step.
///
/// Lookups fail until [`initialize`](GameService::initialize) has run, so consumers
/// never observe configs before overrides were applied.
pub struct ConfigManager {
    store: ConfigStore,
    adapters: RwLock<Vec<Arc<dyn RemoteConfigAdapter>>>,
    initialized: AtomicBool,
    apply_overrides_on_init: bool,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_settings(&OverrideSettings::default())
    }

    pub fn with_settings(settings: &OverrideSettings) -> Self {
        Self {
            store: ConfigStore::new(),
            adapters: RwLock::new(Vec::new()),
            initialized: AtomicBool::new(false),
            apply_overrides_on_init: settings.apply_remote_overrides_on_init,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Register a config under its concrete type.
    pub fn register_config<T: GameConfig>(
        &self,
        mut config: T,
    ) -> Result<ConfigHandle<T>, ConfigError> {
        config.validate();
        let handle = self.store.insert(config)?;
        debug!(config = std::any::type_name::<T>(), "Registered config");
        Ok(handle)
    }

    /// Get the config registered for `T`.
    pub fn get_config<T: GameConfig>(&self) -> Result<ConfigHandle<T>, ConfigError> {
        if !self.is_initialized() {
            return Err(ConfigError::NotInitialized);
        }
        self.store
            .get::<T>()
            .ok_or(ConfigError::NotFound(std::any::type_name::<T>()))
    }

    /// Like [`get_config`](Self::get_config) but returns `None` instead of failing.
    pub fn try_get_config<T: GameConfig>(&self) -> Option<ConfigHandle<T>> {
        if !self.is_initialized() {
            return None;
        }
        self.store.get::<T>()
    }

    pub fn register_remote_adapter(&self, adapter: Arc<dyn RemoteConfigAdapter>) {
        info!(adapter = adapter.name(), "Registered remote config adapter");
        self.adapters.write().push(adapter);
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Run every adapter concurrently and wait for all of them.
    ///
    /// All adapters are awaited even when one fails; the first failure is returned.
    pub async fn apply_remote_overrides(&self, cancel: &CancellationToken) -> Result<(), ConfigError> {
        let adapters = self.adapters.read().clone();
        self.run_adapters(&adapters, cancel).await
    }

    /// Re-run only the adapters that support hot swapping.
    pub async fn reload_hot_swappable(&self, cancel: &CancellationToken) -> Result<(), ConfigError> {
        let adapters: Vec<_> = self
            .adapters
            .read()
            .iter()
            .filter(|adapter| adapter.supports_hot_swap())
            .cloned()
            .collect();
        self.run_adapters(&adapters, cancel).await
    }

    async fn run_adapters(
        &self,
        adapters: &[Arc<dyn RemoteConfigAdapter>],
        cancel: &CancellationToken,
    ) -> Result<(), ConfigError> {
        if adapters.is_empty() {
            return Ok(());
        }

        let results = join_all(
            adapters
                .iter()
                .map(|adapter| adapter.apply_overrides(&self.store, cancel)),
        )
        .await;

        results.into_iter().collect()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameService for ConfigManager {
    fn name(&self) -> &'static str {
        "ConfigManager"
    }

    fn priority(&self) -> i32 {
        priority::CONFIG
    }

    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), ServiceError> {
        if self.is_initialized() {
            return Ok(());
        }

        if self.apply_overrides_on_init {
            self.apply_remote_overrides(cancel)
                .await
                .map_err(|e| ServiceError::Config(e.to_string()))?;
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(configs = self.store.len(), "Config manager initialized");
        Ok(())
    }

    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        self.store.clear();
        self.adapters.write().clear();
        self.initialized.store(false, Ordering::SeqCst);
        debug!("Config manager shut down");
        Ok(())
    }
}
