use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::watch::RetryPolicy;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Command-line options for the page replay binary.
#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Recorded host page (JSON fixture)
    #[arg(short = 'p', long = "page")]
    pub page: PathBuf,
    /// Replay script of host page changes (JSON)
    #[arg(short = 's', long = "script")]
    pub script: Option<PathBuf>,
    /// Settings file (TOML); missing keys fall back to defaults
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Override the initial settle delay in milliseconds
    #[arg(long = "settle-ms")]
    pub settle_ms: Option<u64>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short = 'v', long = "verbose", default_value_t = false, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Config {
    /// Loads the settings file named on the command line and applies overrides.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(ms) = self.settle_ms {
            settings.timing.settle_ms = ms;
        }
        Ok(settings)
    }
}

/// Engine settings. Every field has a default matching the live host page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub selectors: SelectorSettings,
    pub widget: WidgetSettings,
    pub timing: TimingSettings,
}

impl Settings {
    /// Reads settings from a TOML file, or returns defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&data).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub container: String,
    pub item: String,
    /// Matches only the item currently playing.
    pub active: String,
    /// Duration text, looked up inside each item.
    pub duration: String,
    /// Stylesheet link whose `href` encodes the theme.
    pub theme_source: String,
    /// Class the host toggles onto the playing item.
    pub active_class: String,
    /// Substring of the theme `href` that means dark mode.
    pub dark_marker: String,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            container: ".video-pod__list".to_string(),
            item: ".simple-base-item.video-pod__item.normal".to_string(),
            active: ".simple-base-item.video-pod__item.active.normal".to_string(),
            duration: ".stat-item.duration".to_string(),
            theme_source: "link#__css-map__".to_string(),
            active_class: "active".to_string(),
            dark_marker: "dark.css".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSettings {
    pub id: String,
    pub title: String,
    pub index_label: String,
    pub time_label: String,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            id: "playlist-progress-display".to_string(),
            title: "Playlist progress".to_string(),
            index_label: "Current video".to_string(),
            time_label: "Watched".to_string(),
        }
    }
}

/// Delays in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub settle_ms: u64,
    pub active_debounce_ms: u64,
    pub theme_debounce_ms: u64,
    pub navigation_delay_ms: u64,
    pub theme_retry_initial_ms: u64,
    pub theme_retry_factor: u32,
    pub theme_retry_attempts: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            settle_ms: 2000,
            active_debounce_ms: 500,
            theme_debounce_ms: 50,
            navigation_delay_ms: 1000,
            theme_retry_initial_ms: 500,
            theme_retry_factor: 2,
            theme_retry_attempts: 5,
        }
    }
}

impl TimingSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn active_debounce(&self) -> Duration {
        Duration::from_millis(self.active_debounce_ms)
    }

    pub fn theme_debounce(&self) -> Duration {
        Duration::from_millis(self.theme_debounce_ms)
    }

    pub fn navigation_delay(&self) -> Duration {
        Duration::from_millis(self.navigation_delay_ms)
    }

    pub fn theme_retry(&self) -> RetryPolicy {
        RetryPolicy {
            initial: Duration::from_millis(self.theme_retry_initial_ms),
            factor: self.theme_retry_factor.max(1),
            max_attempts: self.theme_retry_attempts,
        }
    }
}
