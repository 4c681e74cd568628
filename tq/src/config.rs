//! Configuration for the tq binary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::scheduler::SchedulerConfig;

/// Project-local config file name
pub const LOCAL_CONFIG: &str = ".taskqueue.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default, rename = "log-level")]
    pub log_level: Option<String>,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load config with fallback chain
    ///
    /// An explicit path must exist and parse. Otherwise tries
    /// `./.taskqueue.yml`, then `<config dir>/taskqueue/taskqueue.yml`,
    /// then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            debug!(path = %path.display(), "Config::load: explicit path");
            return Self::load_from_file(path);
        }

        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => warn!("Failed to load config from {}: {}", path.display(), e),
                }
            }
        }

        debug!("Config::load: no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    /// Load config from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from YAML text; an empty document yields defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("taskqueue").join("taskqueue.yml"));
        }
        paths
    }
}
