//! Config store for locating and loading fleetswap.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{FleetswapConfig, parser};

pub const CONFIG_FILE_NAME: &str = "fleetswap.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// `fleetswap.toml` in the current directory.
    pub fn from_current_dir() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Ok(Self::from_path(cwd.join(CONFIG_FILE_NAME)))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory relative paths inside the file are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn load(&self) -> anyhow::Result<FleetswapConfig> {
        if !self.config_path.exists() {
            anyhow::bail!(
                "No configuration found at {} (pass --config to point elsewhere)",
                self.config_path.display()
            );
        }
        parser::parse_fleetswap_toml(&self.config_path)
    }
}
