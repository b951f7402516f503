//! Per-map configuration, stored alongside the map file

use crate::model::MapRef;
use crate::store::DEFAULT_COMPRESSION_LEVEL;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of one map file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Account owning the map
    pub account: String,
    /// Name of the map within the account
    pub name: String,
    /// zstd level for newly written records
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Flush indexes to disk after every applied mutation
    #[serde(default = "default_sync_on_apply")]
    pub sync_on_apply: bool,
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}

fn default_sync_on_apply() -> bool {
    true
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            account: "local".to_string(),
            name: "default".to_string(),
            compression_level: default_compression_level(),
            sync_on_apply: default_sync_on_apply(),
        }
    }
}

impl MapConfig {
    /// Load the config for a map file, or the default if none was saved
    pub fn load(db_path: &Path) -> Result<Self> {
        let config_path = Self::config_path(db_path);
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: MapConfig = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config next to the map file
    pub fn save(&self, db_path: &Path) -> Result<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::config_path(db_path), content)?;
        Ok(())
    }

    /// Path of the config file for a map file
    pub fn config_path(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_owned();
        name.push(".config.json");
        PathBuf::from(name)
    }

    pub fn map_ref(&self) -> MapRef {
        MapRef::new(self.account.clone(), self.name.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.account.is_empty() || self.name.is_empty() {
            return Err(Error::Config("account and name must be non-empty".into()));
        }
        if !zstd::compression_level_range().contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression level {} out of range",
                self.compression_level
            )));
        }
        Ok(())
    }
}
