//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config of type {0} already registered")]
    AlreadyRegistered(&'static str),

    #[error("Config of type {0} not found")]
    NotFound(&'static str),

    #[error("Config manager not initialized")]
    NotInitialized,

    #[error("Remote override adapter failed: {0}")]
    Adapter(String),

    #[error("Remote override cancelled")]
    Cancelled,

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
