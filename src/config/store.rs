use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Configuration store backed by a JSON file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: BridgeConfig,
}

impl ConfigStore {
    /// Load the file at `path`, or start from defaults if it does not exist
    pub fn open(path: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: BridgeConfig = serde_json::from_str(&text).map_err(|e| {
                    BridgeError::Config(format!("{}: {}", path.display(), e))
                })?;
                debug!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", path.display());
                BridgeConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Get current configuration
    pub fn get(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole configuration and persist it
    pub fn set(&mut self, config: BridgeConfig) -> Result<()> {
        self.config = config;
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}
