//! # Hearth Config
//!
//! Configuration management for the Hearth kernel.
//!
//! - [`ConfigManager`] - type-keyed registry of game configs with remote overrides
//! - [`RemoteConfigAdapter`] - contract for sources that mutate registered configs
//! - [`TomlOverrideAdapter`] - override source backed by a TOML file
//! - [`HearthSettings`] / [`SettingsLoader`] - host settings loaded from TOML

mod adapter;
mod error;
mod game_config;
mod loader;
mod manager;
mod settings;
mod store;

pub use adapter::{RemoteConfigAdapter, TomlOverrideAdapter};
pub use error::ConfigError;
pub use game_config::{merge_toml, ConfigMeta, GameConfig};
pub use loader::SettingsLoader;
pub use manager::ConfigManager;
pub use settings::*;
pub use store::{ConfigHandle, ConfigStore};
