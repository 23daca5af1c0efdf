//! Configuration management for pinepomo front ends
//!
//! Timer durations live with the session data (they travel through the
//! storage port). This file only holds local preferences of the host:
//! ~/.config/pinepomo/config.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::Paths;

/// Local preferences for the `pomo` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Override for the data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Ring the terminal bell when a session completes
    #[serde(default = "default_bell")]
    pub bell: bool,

    /// Milliseconds between ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_bell() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            bell: default_bell(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path(paths: &Paths) -> PathBuf {
        paths.config.join("config.json")
    }

    /// Load config from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Resolve the effective paths, honouring `data_dir`
    pub fn paths(&self) -> Paths {
        match &self.data_dir {
            Some(dir) => Paths::with_data_dir(dir),
            None => Paths::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.bell);
        assert_eq!(config.tick_interval_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            data_dir: Some(PathBuf::from("/srv/pomo")),
            bell: false,
            tick_interval_ms: 250,
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.paths().data, PathBuf::from("/srv/pomo"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"bell": false}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.bell);
        assert_eq!(config.tick_interval_ms, 1000);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(Config::load(&path).is_err());
    }
}
