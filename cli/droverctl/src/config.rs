//! CLI configuration.
//!
//! Holds the scheduler API URL of every known cluster. The file lives in
//! the platform config directory as `config.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("io", "drover", "drover")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// Scheduler endpoint of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub api_url: String,
}

/// Known clusters by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clusters(BTreeMap<String, ClusterConfig>);

impl Clusters {
    pub fn get(&self, name: &str) -> Option<&ClusterConfig> {
        self.0.get(name)
    }

    /// Add or replace a cluster, returning the previous entry.
    pub fn insert(&mut self, name: impl Into<String>, api_url: impl Into<String>) -> Option<ClusterConfig> {
        self.0.insert(
            name.into(),
            ClusterConfig {
                api_url: api_url.into(),
            },
        )
    }

    pub fn remove(&mut self, name: &str) -> Option<ClusterConfig> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClusterConfig)> + '_ {
        self.0.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// API URL for `name`, or [`CliError::UnknownCluster`].
    pub fn api_url(&self, name: &str) -> Result<&str, CliError> {
        self.get(name)
            .map(|config| config.api_url.as_str())
            .ok_or_else(|| CliError::UnknownCluster(name.to_string()))
    }
}

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clusters: Clusters,
}

impl Config {
    /// Load config from disk, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<PathBuf> {
        let dir = config_dir()?;
        fs::create_dir_all(&dir)?;

        let path = dir.join(CONFIG_FILE);
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            file.write_all(contents.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
        }

        Ok(())
    }
}
