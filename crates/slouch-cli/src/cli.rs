//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slouch_core::Activity;

/// Posture statistics tracker.
///
/// Reads bad-posture duration samples from a detector on stdin and keeps
/// daily, per-time-window and per-activity statistics.
#[derive(Debug, Parser)]
#[command(name = "slouch", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a monitoring session from detector events on stdin.
    Run {
        /// Activity to start with (work, study, entertainment).
        /// Defaults to the last selected activity.
        #[arg(long)]
        activity: Option<Activity>,
    },

    /// Show accumulated statistics.
    Report {
        /// Output the raw statistics record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete all statistics and the remembered activity.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}
