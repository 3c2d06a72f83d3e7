//! taskstore configuration

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Standalone configuration for the `taskstore` binary. Library consumers
/// that embed [`crate::Store`] directly don't need this; it exists for the
/// CLI and for tools that want the same fallback-chain loading behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `store.db` and the per-collection JSONL logs
    #[serde(rename = "store-path")]
    pub store_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".taskstore"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain: explicit path, project-local
    /// dotfile, user config dir, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".taskstore.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!("Failed to load config from {}: {}", local_config.display(), e),
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskstore").join("taskstore.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to load config from {}: {}", user_config.display(), e),
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_store_path() {
        let config = Config::default();
        assert_eq!(config.store_path, PathBuf::from(".taskstore"));
    }

    #[test]
    fn deserialize_overrides_path() {
        let yaml = "store-path: /tmp/custom-store\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/custom-store"));
    }
}
