//! Demo service set driven by `hearth run`.
//!
//! Small enough to read in one sitting, but it touches every kernel path:
//! capability binding, ordered startup, marshalled and fan-out events,
//! serialized commands, config overrides and teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use hearth_config::{
    merge_toml, ConfigError, ConfigManager, ConfigMeta, GameConfig, HearthSettings,
};
use hearth_core::{CommandProcessor, EventBus, LifecycleOrchestrator, ServiceDeclaration};
use hearth_protocols::{
    priority, CancellationToken, Command, CommandError, Event, GameService, GameStateChanged,
    LifecyclePhase, ServiceError, ServiceInitializationFailed,
};

#[cfg(test)]
#[path = "demo_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AudioConfig {
    #[serde(default)]
    pub meta: ConfigMeta,
    pub master_volume: f32,
    pub music_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            meta: ConfigMeta::with_id("audio"),
            master_volume: 1.0,
            music_volume: 0.8,
        }
    }
}

impl GameConfig for AudioConfig {
    fn meta(&self) -> &ConfigMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ConfigMeta {
        &mut self.meta
    }

    fn apply_remote_overrides(&mut self) {
        self.master_volume = self.master_volume.clamp(0.0, 1.0);
        self.music_volume = self.music_volume.clamp(0.0, 1.0);
    }

    fn merge_overrides(&mut self, patch: &toml::Table) -> Result<bool, ConfigError> {
        merge_toml(self, patch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AutosaveConfig {
    #[serde(default)]
    pub meta: ConfigMeta,
    pub max_slots: usize,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            meta: ConfigMeta::with_id("autosave"),
            max_slots: 3,
        }
    }
}

impl GameConfig for AutosaveConfig {
    fn meta(&self) -> &ConfigMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ConfigMeta {
        &mut self.meta
    }

    fn merge_overrides(&mut self, patch: &toml::Table) -> Result<bool, ConfigError> {
        merge_toml(self, patch)
    }
}

pub(crate) fn register_configs(config: &ConfigManager) -> Result<(), ConfigError> {
    config.register_config(AudioConfig::default())?;
    config.register_config(AutosaveConfig::default())?;
    Ok(())
}

/// Published through the fan-out path during the tour.
#[derive(Debug)]
pub(crate) struct AchievementUnlocked {
    pub id: &'static str,
}

impl Event for AchievementUnlocked {}

/// Persistent storage capability resolved by commands.
pub(crate) trait SaveStore: Send + Sync {
    fn save(&self, label: String) -> Result<usize, CommandError>;

    fn saved(&self) -> Vec<String>;
}

/// In-memory save slots, bounded by [`AutosaveConfig::max_slots`].
pub(crate) struct MemorySaves {
    config: Arc<ConfigManager>,
    slots: Mutex<Vec<String>>,
}

impl SaveStore for MemorySaves {
    fn save(&self, label: String) -> Result<usize, CommandError> {
        let max_slots = self
            .config
            .get_config::<AutosaveConfig>()
            .map(|handle| handle.read().max_slots)
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        let mut slots = self.slots.lock();
        if slots.len() >= max_slots {
            return Err(CommandError::ExecutionFailed(format!(
                "all {max_slots} save slots are used"
            )));
        }
        slots.push(label);
        Ok(slots.len())
    }

    fn saved(&self) -> Vec<String> {
        self.slots.lock().clone()
    }
}

#[async_trait]
impl GameService for MemorySaves {
    fn name(&self) -> &'static str {
        "MemorySaves"
    }

    fn priority(&self) -> i32 {
        priority::PLATFORM
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        debug!("Save slots ready");
        Ok(())
    }

    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        info!(saves = ?self.saved(), "Flushing save slots");
        Ok(())
    }
}

/// Counts what happened during the session and reports it on shutdown.
#[derive(Default)]
pub(crate) struct SessionStats {
    transitions: AtomicUsize,
    achievements: AtomicUsize,
}

impl SessionStats {
    fn attach(self: &Arc<Self>, bus: &EventBus) {
        let stats = Arc::clone(self);
        bus.subscribe_fn(move |event: &GameStateChanged| {
            stats.transitions.fetch_add(1, Ordering::Relaxed);
            debug!(from = %event.previous_phase, to = %event.new_phase, "Session saw transition");
            Ok(())
        });

        let stats = Arc::clone(self);
        bus.subscribe_fn(move |event: &AchievementUnlocked| {
            stats.achievements.fetch_add(1, Ordering::Relaxed);
            info!(achievement = event.id, "Achievement unlocked");
            Ok(())
        });
    }
}

#[async_trait]
impl GameService for SessionStats {
    fn name(&self) -> &'static str {
        "SessionStats"
    }

    fn priority(&self) -> i32 {
        priority::GAMEPLAY
    }

    async fn initialize(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn shutdown(&self, _cancel: &CancellationToken) -> Result<(), ServiceError> {
        info!(
            transitions = self.transitions.load(Ordering::Relaxed),
            achievements = self.achievements.load(Ordering::Relaxed),
            "Session summary"
        );
        Ok(())
    }
}

pub(crate) fn declarations(settings: &HearthSettings) -> Vec<ServiceDeclaration> {
    let commands = settings.commands.clone();
    vec![
        ServiceDeclaration::new("SessionStats", |binder| {
            let stats = Arc::new(SessionStats::default());
            let bus: Arc<EventBus> = binder.resolve::<EventBus>()?;
            stats.attach(&bus);
            binder.bind(stats.clone())?;
            let service: Arc<dyn GameService> = stats;
            Ok(service)
        }),
        ServiceDeclaration::new("MemorySaves", |binder| {
            let saves = Arc::new(MemorySaves {
                config: binder.resolve::<ConfigManager>()?,
                slots: Mutex::new(Vec::new()),
            });
            binder.bind::<dyn SaveStore>(saves.clone())?;
            let service: Arc<dyn GameService> = saves;
            Ok(service)
        }),
        ServiceDeclaration::new("CommandProcessor", move |binder| {
            let processor = Arc::new(CommandProcessor::with_settings(&commands));
            binder.bind(processor.clone())?;
            let service: Arc<dyn GameService> = processor;
            Ok(service)
        }),
    ]
}

/// Log kernel-produced events.
pub(crate) fn observe(orchestrator: &LifecycleOrchestrator) {
    orchestrator
        .event_bus()
        .subscribe_fn(|event: &ServiceInitializationFailed| {
            warn!(service = event.service_kind, error = %event.error, "Startup degraded");
            Ok(())
        });
}

pub(crate) struct SaveGameCommand {
    label: String,
    store: Arc<dyn SaveStore>,
}

#[async_trait]
impl Command for SaveGameCommand {
    fn name(&self) -> &'static str {
        "SaveGame"
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<(), CommandError> {
        tokio::select! {
            _ = cancel.cancelled() => return Err(CommandError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {}
        }
        let slot = self.store.save(self.label.clone())?;
        info!(label = %self.label, slot, "Game saved");
        Ok(())
    }

    fn on_failure(&self, error: CommandError) {
        warn!(label = %self.label, error = %error, "Save failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TourStep {
    Load,
    Play,
    Celebrate,
    Pause,
    Unpause,
    Quit,
}

const TOUR: [TourStep; 6] = [
    TourStep::Load,
    TourStep::Play,
    TourStep::Celebrate,
    TourStep::Pause,
    TourStep::Unpause,
    TourStep::Quit,
];

/// Scripted walk through the phases, one step every `step_ticks` ticks.
pub(crate) struct PhaseTour {
    step_ticks: u64,
    next: usize,
}

impl PhaseTour {
    pub(crate) fn new(max_ticks: Option<u64>) -> Self {
        let step_ticks = match max_ticks {
            Some(max) => (max / TOUR.len() as u64).max(1),
            None => 30,
        };
        Self { step_ticks, next: 0 }
    }

    /// Run the step due at `tick`, if any.
    pub(crate) fn advance(&mut self, tick: u64, orchestrator: &Arc<LifecycleOrchestrator>) {
        if tick % self.step_ticks != 0 {
            return;
        }
        let Some(step) = TOUR.get(self.next).copied() else {
            return;
        };
        self.next += 1;
        debug!(tick, step = ?step, "Tour step");

        match step {
            TourStep::Load => {
                orchestrator.transition_to(LifecyclePhase::Loading);
            }
            TourStep::Play => {
                orchestrator.transition_to(LifecyclePhase::Gameplay);
                queue_saves(orchestrator, 4);
            }
            TourStep::Celebrate => {
                let bus = Arc::clone(orchestrator.event_bus());
                let cancel = orchestrator.shutdown_token().clone();
                tokio::spawn(async move {
                    for id in ["first_steps", "pause_master", "hoarder"] {
                        bus.publish_async(AchievementUnlocked { id }, &cancel).await;
                    }
                });
            }
            TourStep::Pause => {
                orchestrator.suspend();
            }
            TourStep::Unpause => {
                orchestrator.resume();
                let config = Arc::clone(orchestrator.config());
                let cancel = orchestrator.shutdown_token().clone();
                tokio::spawn(async move {
                    if let Err(e) = config.reload_hot_swappable(&cancel).await {
                        warn!(error = %e, "Config reload failed");
                    }
                });
            }
            TourStep::Quit => {
                orchestrator.transition_to(LifecyclePhase::Shutdown);
            }
        }
    }
}

fn queue_saves(orchestrator: &LifecycleOrchestrator, count: usize) {
    let registry = orchestrator.registry();
    let (Some(processor), Some(store)) = (
        registry.try_resolve::<CommandProcessor>(),
        registry.try_resolve::<dyn SaveStore>(),
    ) else {
        warn!("Save services unavailable");
        return;
    };

    for n in 0..count {
        processor.enqueue(SaveGameCommand {
            label: format!("checkpoint-{n}"),
            store: Arc::clone(&store),
        });
    }
}
