//! Settings loader.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::settings::HearthSettings;

/// Settings loader with environment variable substitution.
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<HearthSettings, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load settings from a TOML file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<HearthSettings, ConfigError> {
        if !path.exists() {
            return Ok(HearthSettings::default());
        }
        Self::load(path)
    }

    /// Load settings from a string.
    pub fn load_str(content: &str) -> Result<HearthSettings, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let settings: HearthSettings = toml::from_str(&expanded)?;
        Self::validate(&settings)?;
        Ok(settings)
    }

    fn validate(settings: &HearthSettings) -> Result<(), ConfigError> {
        if settings.host.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "host.tick_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if settings.commands.shutdown_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "commands.shutdown_poll_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.hearth`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}
