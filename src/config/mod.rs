// Author: kelexine (https://github.com/kelexine)
// config/mod.rs — Global configuration loader

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Represents the structure of `config.toml`.
#[derive(Deserialize, Default, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Dump used when `--snapshot` is not given.
    pub snapshot: Option<PathBuf>,
    /// Node capacity used when `--capacity` is not given.
    pub capacity: Option<usize>,
    pub color: Option<bool>,
}

impl GlobalConfig {
    /// Load `<config_dir>/lockscan/config.toml`, returning defaults if it is
    /// missing or unreadable.
    pub fn load() -> Self {
        if let Some(mut path) = dirs::config_dir() {
            path.push("lockscan");
            path.push("config.toml");

            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("{:#}", e),
                }
            }
        }
        Self::default()
    }

    /// Load an explicitly requested config file; any failure is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
