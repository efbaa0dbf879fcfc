//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use slouch_core::SessionConfig;

/// How often the detector delivers a duration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingSpeed {
    /// One sample per second.
    #[default]
    Fast,
    /// One sample every 2.5 seconds.
    Medium,
    /// One sample every 5 seconds.
    Slow,
}

impl ProcessingSpeed {
    /// Nominal gap between two samples.
    pub const fn sample_interval(self) -> Duration {
        match self {
            Self::Fast => Duration::from_millis(1000),
            Self::Medium => Duration::from_millis(2500),
            Self::Slow => Duration::from_millis(5000),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the statistics database.
    pub database_path: PathBuf,
    /// Nominal sample cadence of the detector.
    pub processing_speed: ProcessingSpeed,
    /// Seconds between checkpoints that accrue daily time and persist.
    pub checkpoint_interval_secs: u64,
    /// Longest gap in seconds between two time-window settlements.
    pub time_window_refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("slouch.db"),
            processing_speed: ProcessingSpeed::default(),
            checkpoint_interval_secs: 600,
            time_window_refresh_secs: 600,
        }
    }
}

impl Config {
    /// Loads configuration from the default locations, optionally layering a
    /// specific file on top.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SLOUCH_*)
        figment = figment.merge(Env::prefixed("SLOUCH_"));

        let config: Self = figment.extract()?;
        if config.checkpoint_interval_secs == 0 || config.time_window_refresh_secs == 0 {
            return Err(figment::Error::from(
                "checkpoint_interval_secs and time_window_refresh_secs must be positive".to_string(),
            ));
        }
        Ok(config)
    }

    pub const fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }

    /// Time without samples after which the detector is reported as stalled.
    pub fn stall_after(&self) -> Duration {
        self.processing_speed.sample_interval() * 4
    }

    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            time_window_refresh: Duration::from_secs(self.time_window_refresh_secs),
        }
    }
}

/// Returns the platform-specific config directory for slouch.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("slouch"))
}

/// Returns the platform-specific data directory for slouch.
///
/// On Linux: `~/.local/share/slouch`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("slouch"))
}
