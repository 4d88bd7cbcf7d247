//! Host settings schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings for a Hearth host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HearthSettings {
    #[serde(default)]
    pub host: HostSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub commands: CommandSettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,

    #[serde(default)]
    pub config: OverrideSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Host tick loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Interval between dispatcher drains on the main thread.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks; runs until shutdown when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: None,
        }
    }
}

impl HostSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn default_tick_interval_ms() -> u64 {
    16
}

/// Event bus settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventSettings {
    /// Maximum concurrent handlers for async fan-out; 0 means available parallelism.
    #[serde(default)]
    pub async_parallelism: usize,
}

impl EventSettings {
    /// Resolved fan-out width, never zero.
    pub fn parallelism(&self) -> usize {
        if self.async_parallelism > 0 {
            return self.async_parallelism;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Command processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub shutdown_poll_interval_ms: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            shutdown_poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl CommandSettings {
    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_interval_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

/// Lifecycle orchestrator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Upper bound for each service's `shutdown`; unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_shutdown_timeout_ms: Option<u64>,
}

impl LifecycleSettings {
    pub fn service_shutdown_timeout(&self) -> Option<Duration> {
        self.service_shutdown_timeout_ms.map(Duration::from_millis)
    }
}

/// Remote override settings for the config registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideSettings {
    /// Run remote-override adapters while the config registry initializes.
    #[serde(default = "default_apply_on_init")]
    pub apply_remote_overrides_on_init: bool,

    /// TOML file read by the file override adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_file: Option<String>,
}

impl Default for OverrideSettings {
    fn default() -> Self {
        Self {
            apply_remote_overrides_on_init: default_apply_on_init(),
            override_file: None,
        }
    }
}

fn default_apply_on_init() -> bool {
    cfg!(debug_assertions)
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines on the console instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rolling log files; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_dir: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
