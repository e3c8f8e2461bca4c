//! Application configuration management.
//!
//! Holds the user's flow unit preference and the refresh pacing used by the
//! favorites provider. Stored at `~/.config/reachflow/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::manager::DEFAULT_REACH_STALE_DAYS;
use crate::models::FlowUnit;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "reachflow";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Delay before the startup refresh, so the cached list renders first.
const DEFAULT_INITIAL_REFRESH_DELAY_MS: u64 = 500;

/// Gap between favorites during a sequential refresh.
/// Keeps a long favorites list from bursting the forecast API.
const DEFAULT_PACING_MS: u64 = 200;

/// Delay between a unit change and the refresh that repopulates flows.
const DEFAULT_UNIT_CHANGE_REFRESH_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshTiming {
    pub initial_refresh_delay_ms: u64,
    pub pacing_ms: u64,
    pub unit_change_refresh_delay_ms: u64,
}

impl RefreshTiming {
    /// No delays at all.
    pub fn immediate() -> Self {
        Self {
            initial_refresh_delay_ms: 0,
            pacing_ms: 0,
            unit_change_refresh_delay_ms: 0,
        }
    }

    pub fn initial_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.initial_refresh_delay_ms)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn unit_change_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.unit_change_refresh_delay_ms)
    }
}

impl Default for RefreshTiming {
    fn default() -> Self {
        Self {
            initial_refresh_delay_ms: DEFAULT_INITIAL_REFRESH_DELAY_MS,
            pacing_ms: DEFAULT_PACING_MS,
            unit_change_refresh_delay_ms: DEFAULT_UNIT_CHANGE_REFRESH_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub flow_unit: FlowUnit,
    pub refresh: RefreshTiming,
    pub reach_cache_stale_days: i64,
    /// Replaces the platform cache directory when set.
    #[serde(rename = "cache_dir", skip_serializing_if = "Option::is_none")]
    pub cache_dir_override: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flow_unit: FlowUnit::default(),
            refresh: RefreshTiming::default(),
            reach_cache_stale_days: DEFAULT_REACH_STALE_DAYS,
            cache_dir_override: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Read the config at `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir_override {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
