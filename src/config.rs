use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::utils::paths::get_config_path;

/// Remote backup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory under the WebDAV root that holds the database copy
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Upload chunk size in bytes; progress is reported once per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_remote_dir() -> String {
    "memo".to_string()
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_dir: default_remote_dir(),
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Fallback log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    pub fn load(memo_dir: &Path) -> Result<Self> {
        let config_path = get_config_path(memo_dir);

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {config_path:?}"))?;
        Ok(config)
    }

    pub fn save(&self, memo_dir: &Path) -> Result<()> {
        let config_path = get_config_path(memo_dir);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.sync.remote_dir, "memo");
        assert_eq!(config.sync.chunk_size, 65536);
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
        log_level = "debug"

        [sync]
        remote_dir = "backups/memo"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.sync.remote_dir, "backups/memo");
        assert_eq!(config.sync.chunk_size, 65536);
    }

    #[test]
    fn test_sync_uses_default_when_missing() {
        let config: Config = toml::from_str(r#"log_level = "warn""#).unwrap();
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(Config::load(temp_dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.sync.remote_dir = "elsewhere".to_string();

        config.save(temp_dir.path()).unwrap();
        assert_eq!(Config::load(temp_dir.path()).unwrap(), config);
    }
}
