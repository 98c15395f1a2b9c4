//! Runtime configuration and config-file discovery.
//!
//! Lookup order for the settings file:
//! 1. explicit path (`--config`)
//! 2. `<platform config dir>/scenedeck/scenedeck.json`
//! 3. built-in defaults
//!
//! A missing file yields defaults; a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::entities::slide::InitialPlayState;

/// Ticks per second of the headless driver
pub const DEFAULT_FRAME_RATE: f32 = 60.0;
/// Maximum events held by the bus queue before eviction
pub const QUEUE_LIMIT: usize = 4096;
/// Bound on re-entrant command drain passes
pub const DEFAULT_MAX_COMMAND_PASSES: usize = 64;
/// Bound on automatic play-through slide hops within one tick
pub const DEFAULT_MAX_PLAY_THROUGH_HOPS: usize = 32;

const APP_DIR: &str = "scenedeck";
const CONFIG_FILE: &str = "scenedeck.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub frame_rate: f32,
    pub max_command_passes: usize,
    pub max_play_through_hops: usize,
    /// Used for slides whose document does not say
    pub default_initial_play_state: InitialPlayState,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            max_command_passes: DEFAULT_MAX_COMMAND_PASSES,
            max_play_through_hops: DEFAULT_MAX_PLAY_THROUGH_HOPS,
            default_initial_play_state: InitialPlayState::Play,
        }
    }
}

impl RuntimeConfig {
    /// Frame interval in milliseconds.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.frame_rate.max(1.0) as f64
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid runtime config")
    }

    /// Load from a file; a missing file gives defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve the config path (explicit file, else the config dir) and load it.
    pub fn discover(explicit: Option<&Path>, paths: &PathConfig) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match paths.config_file() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }
}

/// Platform directories for config and data files.
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Overrides the platform config directory
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: Some(dir.into()),
        }
    }

    pub fn config_dir(&self) -> Option<PathBuf> {
        self.config_dir
            .clone()
            .or_else(|| dirs_next::config_dir().map(|d| d.join(APP_DIR)))
    }

    pub fn config_file(&self) -> Option<PathBuf> {
        self.config_dir().map(|d| d.join(CONFIG_FILE))
    }

    /// Default log file location
    pub fn data_file(&self, name: &str) -> PathBuf {
        dirs_next::data_dir()
            .map(|d| d.join(APP_DIR).join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
