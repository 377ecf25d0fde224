//! Configuration persistence for Vibe
//!
//! Stores defaults for the history database and analysis parameters.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use vibe_analysis::{TimeRange, DEFAULT_BINS, FEATURE_BINS};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// History database location
    pub database_path: PathBuf,
    /// Bucket count for the tempo distribution
    pub tempo_bins: usize,
    /// Bucket count for per-feature histograms
    pub feature_bins: usize,
    /// Maximum records shown by `history`
    pub history_limit: usize,
    /// Owner that history records are filed under
    pub owner: String,
    /// Time range recorded when none is given
    pub time_range: TimeRange,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: Self::default_database_path(),
            tempo_bins: DEFAULT_BINS,
            feature_bins: FEATURE_BINS,
            history_limit: 100,
            owner: "local".to_string(),
            time_range: TimeRange::default(),
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibe")
            .join("config.toml")
    }

    fn default_database_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibe")
            .join("history.db")
    }
}
