//! The contract for typed configuration objects.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// Metadata carried by every config object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMeta {
    #[serde(default)]
    pub config_id: String,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_enable_remote_overrides")]
    pub enable_remote_overrides: bool,
}

impl Default for ConfigMeta {
    fn default() -> Self {
        Self {
            config_id: String::new(),
            version: default_version(),
            enable_remote_overrides: default_enable_remote_overrides(),
        }
    }
}

impl ConfigMeta {
    pub fn with_id(config_id: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            ..Default::default()
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_enable_remote_overrides() -> bool {
    true
}

/// A typed configuration object stored in the [`ConfigManager`](crate::ConfigManager).
///
/// The field-level semantics of a config are opaque to the kernel. Configs that
/// want to accept file overrides implement [`merge_overrides`](GameConfig::merge_overrides),
/// usually by delegating to [`merge_toml`].
pub trait GameConfig: Send + Sync + 'static {
    fn meta(&self) -> &ConfigMeta;

    fn meta_mut(&mut self) -> &mut ConfigMeta;

    /// Normalize the config before registration. Assigns a generated id when missing.
    fn validate(&mut self) {
        if self.meta().config_id.is_empty() {
            self.meta_mut().config_id = generate_config_id(std::any::type_name::<Self>());
        }
    }

    /// Hook run after a remote override was merged into this config.
    fn apply_remote_overrides(&mut self) {}

    /// Merge a table of overridden fields. Returns `false` when overrides are unsupported.
    fn merge_overrides(&mut self, _patch: &toml::Table) -> Result<bool, ConfigError> {
        Ok(false)
    }
}

/// Merge `patch` over the serialized form of `target` and deserialize the result back.
///
/// Keys absent from the patch keep their current value.
pub fn merge_toml<T>(target: &mut T, patch: &toml::Table) -> Result<bool, ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let mut current = toml::Value::try_from(&*target)?;
    let table = current.as_table_mut().ok_or_else(|| {
        ConfigError::InvalidFormat("config does not serialize to a table".to_string())
    })?;
    for (key, value) in patch {
        table.insert(key.clone(), value.clone());
    }
    *target = current.try_into()?;
    Ok(true)
}

fn generate_config_id(type_name: &str) -> String {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", short, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct AudioConfig {
        #[serde(default)]
        meta: ConfigMeta,
        master_volume: f64,
        muted: bool,
    }

    impl GameConfig for AudioConfig {
        fn meta(&self) -> &ConfigMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut ConfigMeta {
            &mut self.meta
        }
    }

    fn audio() -> AudioConfig {
        AudioConfig {
            meta: ConfigMeta::default(),
            master_volume: 0.8,
            muted: false,
        }
    }

    #[test]
    fn test_meta_defaults() {
        let meta = ConfigMeta::default();
        assert!(meta.config_id.is_empty());
        assert_eq!(meta.version, 1);
        assert!(meta.enable_remote_overrides);
    }

    #[test]
    fn test_validate_generates_id() {
        let mut config = audio();
        config.validate();
        let id = &config.meta.config_id;
        assert!(id.starts_with("AudioConfig_"));
        assert_eq!(id.len(), "AudioConfig_".len() + 8);
    }

    #[test]
    fn test_validate_keeps_existing_id() {
        let mut config = audio();
        config.meta = ConfigMeta::with_id("audio");
        config.validate();
        assert_eq!(config.meta.config_id, "audio");
    }

    #[test]
    fn test_default_merge_is_unsupported() {
        let mut config = audio();
        let patch = toml::Table::new();
        assert!(!config.merge_overrides(&patch).unwrap());
    }

    #[test]
    fn test_merge_toml_overrides_only_given_keys() {
        let mut config = audio();
        let mut patch = toml::Table::new();
        patch.insert("muted".to_string(), toml::Value::Boolean(true));

        assert!(merge_toml(&mut config, &patch).unwrap());
        assert!(config.muted);
        assert_eq!(config.master_volume, 0.8);
    }

    #[test]
    fn test_merge_toml_type_mismatch_fails() {
        let mut config = audio();
        let mut patch = toml::Table::new();
        patch.insert(
            "master_volume".to_string(),
            toml::Value::String("loud".to_string()),
        );

        assert!(merge_toml(&mut config, &patch).is_err());
        assert_eq!(config.master_volume, 0.8);
    }
}
