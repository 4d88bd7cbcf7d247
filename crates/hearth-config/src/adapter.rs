//! Remote override adapters.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::store::ConfigStore;

/// A source of overrides that mutates registered configs in place.
#[async_trait]
pub trait RemoteConfigAdapter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Apply overrides to the configs in `store`.
    async fn apply_overrides(
        &self,
        store: &ConfigStore,
        cancel: &CancellationToken,
    ) -> Result<(), ConfigError>;

    /// Whether the adapter may run again after initialization for live tuning.
    fn supports_hot_swap(&self) -> bool {
        false
    }
}

/// Override adapter reading a TOML file whose top-level tables are keyed by config id.
///
/// ```toml
/// [audio]
/// master_volume = 0.5
/// ```
pub struct TomlOverrideAdapter {
    path: PathBuf,
    hot_swap: bool,
}

impl TomlOverrideAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hot_swap: true,
        }
    }

    /// Opt out of post-init reloads.
    pub fn without_hot_swap(mut self) -> Self {
        self.hot_swap = false;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl RemoteConfigAdapter for TomlOverrideAdapter {
    fn name(&self) -> &str {
        "toml-file"
    }

    async fn apply_overrides(
        &self,
        store: &ConfigStore,
        cancel: &CancellationToken,
    ) -> Result<(), ConfigError> {
        if cancel.is_cancelled() {
            return Err(ConfigError::Cancelled);
        }

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Override file not found, nothing to apply");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let overrides: toml::Table = toml::from_str(&content)?;

        let mut applied = 0;
        for (config_id, value) in &overrides {
            if cancel.is_cancelled() {
                return Err(ConfigError::Cancelled);
            }
            let Some(patch) = value.as_table() else {
                warn!(config_id, "Override entry is not a table, skipping");
                continue;
            };
            match store.merge_by_id(config_id, patch)? {
                0 => debug!(config_id, "No config accepted override"),
                n => applied += n,
            }
        }

        info!(path = %self.path.display(), applied, "Applied config overrides");
        Ok(())
    }

    fn supports_hot_swap(&self) -> bool {
        self.hot_swap
    }
}
