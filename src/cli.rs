//! CLI definitions for Hearth.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Hearth headless host.
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Headless host for the Hearth application-lifecycle kernel")]
#[command(version)]
pub(crate) struct Cli {
    /// Settings file path
    #[arg(short, long, default_value = "config/hearth.toml", global = true, env = "HEARTH_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Start the kernel and drive the host loop (default)
    Run {
        /// Stop after this many ticks (overrides `host.max_ticks`)
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Load the settings file and print the effective settings
    CheckConfig,
}
