//! Hearth - headless host for the application-lifecycle kernel
//!
//! Loads settings, starts the orchestrator with the demo service set and
//! drains the main-thread dispatcher once per tick until shutdown completes.

mod cli;
mod demo;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use hearth_config::{
    ConfigManager, HearthSettings, LoggingSettings, SettingsLoader, TomlOverrideAdapter,
};
use hearth_core::{LifecycleOrchestrator, MainThreadDispatcher};
use hearth_protocols::LifecyclePhase;

use crate::cli::{Cli, Commands};
use crate::demo::PhaseTour;

fn init_tracing(logging: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let console = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    // Daily rotation, keeping a month of files
    let file = match &logging.file_dir {
        Some(dir) => {
            let log_dir = SettingsLoader::expand_path(dir);
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("hearth")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes buffered lines on exit
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = PathBuf::from(SettingsLoader::expand_path(&cli.config.to_string_lossy()));
    let settings = SettingsLoader::load_or_default(&config_path)?;

    init_tracing(&settings.logging)?;
    if !config_path.exists() {
        warn!(path = %config_path.display(), "Settings file not found, using defaults");
    }

    match cli.command {
        None => run_host(settings, None).await,
        Some(Commands::Run { ticks }) => run_host(settings, ticks).await,
        Some(Commands::CheckConfig) => check_config(&settings, &config_path),
    }
}

fn check_config(
    settings: &HearthSettings,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "Settings are valid");
    println!("{}", toml::to_string_pretty(settings)?);
    Ok(())
}

/// Start the kernel and run the tick loop on the main thread until the host signal fires.
async fn run_host(
    settings: HearthSettings,
    ticks: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Hearth v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(ConfigManager::with_settings(&settings.config));
    demo::register_configs(&config)?;
    if let Some(file) = &settings.config.override_file {
        let path = SettingsLoader::expand_path(file);
        info!(path = %path, "Using config override file");
        config.register_remote_adapter(Arc::new(TomlOverrideAdapter::new(path)));
    }

    let dispatcher = MainThreadDispatcher::new();
    let orchestrator = demo::declarations(&settings)
        .into_iter()
        .fold(
            LifecycleOrchestrator::builder()
                .with_settings(&settings)
                .dispatcher(dispatcher.clone())
                .config(config),
            |builder, declaration| builder.declare(declaration),
        )
        .build();
    demo::observe(&orchestrator);

    if let Err(e) = orchestrator.start().await {
        error!(error = %e, "Startup failed");
        orchestrator.shutdown().await;
        return Err(e.into());
    }

    let max_ticks = ticks.or(settings.host.max_ticks);
    let mut tour = PhaseTour::new(max_ticks);
    let mut interval = tokio::time::interval(settings.host.tick_interval());
    let signal = orchestrator.host_signal().clone();
    let mut tick: u64 = 0;

    dispatcher.set_host_running(true);
    info!(tick_interval = ?settings.host.tick_interval(), max_ticks = ?max_ticks, "Host loop running");

    loop {
        tokio::select! {
            _ = signal.wait() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                orchestrator.transition_to(LifecyclePhase::Shutdown);
                continue;
            }
            _ = interval.tick() => {}
        }

        dispatcher.drain();
        tick += 1;
        tour.advance(tick, &orchestrator);

        if max_ticks.is_some_and(|max| tick >= max) {
            orchestrator.transition_to(LifecyclePhase::Shutdown);
        }
    }

    dispatcher.set_host_running(false);
    let late = dispatcher.drain();
    info!(ticks = tick, late_callbacks = late, "Host stopped");
    Ok(())
}
