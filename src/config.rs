//! Persistent settings for the demo binary.
//!
//! Stored as pretty-printed JSON in `playa_session.json`, located through
//! [`crate::paths`]. A missing file yields defaults; a malformed one is an error.

use crate::engine::sim::SimConfig;
use crate::entities::InstanceConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::paths::{PathConfig, config_file, data_file, ensure_dirs};

/// Settings file name inside the config directory.
pub const SETTINGS_FILE: &str = "playa_session.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub instance: InstanceConfig,
    pub sim: SimConfig,
}

impl Settings {
    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Load from the resolved config directory.
    pub fn load_from(paths: &PathConfig) -> Result<Self> {
        Self::load(&config_file(SETTINGS_FILE, paths))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }
}
