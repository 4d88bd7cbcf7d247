//! Application lifecycle phases.

use serde::{Deserialize, Serialize};

/// Coarse application phase governed by the lifecycle state machine.
///
/// Exactly one phase is active at a time. [`LifecyclePhase::Shutdown`] is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Initial phase, core systems are being constructed.
    #[default]
    Boot = 0,
    /// Assets and services warming up.
    Preload = 1,
    /// Front-end menu.
    MainMenu = 2,
    /// Transitional loading screen.
    Loading = 3,
    /// Active gameplay, time runs at full scale.
    Gameplay = 4,
    /// Gameplay suspended, time scale frozen.
    Paused = 5,
    /// Terminal phase; no transition leaves it.
    Shutdown = 6,
}

impl LifecyclePhase {
    /// Whether no transition may leave this phase.
    pub fn is_terminal(self) -> bool {
        self == LifecyclePhase::Shutdown
    }
}

impl From<u8> for LifecyclePhase {
    fn from(v: u8) -> Self {
        match v {
            0 => LifecyclePhase::Boot,
            1 => LifecyclePhase::Preload,
            2 => LifecyclePhase::MainMenu,
            3 => LifecyclePhase::Loading,
            4 => LifecyclePhase::Gameplay,
            5 => LifecyclePhase::Paused,
            6 => LifecyclePhase::Shutdown,
            _ => LifecyclePhase::Boot,
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecyclePhase::Boot => "boot",
            LifecyclePhase::Preload => "preload",
            LifecyclePhase::MainMenu => "main_menu",
            LifecyclePhase::Loading => "loading",
            LifecyclePhase::Gameplay => "gameplay",
            LifecyclePhase::Paused => "paused",
            LifecyclePhase::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}
