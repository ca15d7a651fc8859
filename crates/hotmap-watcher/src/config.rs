//! Watch configuration.
//!
//! Read from `<root>/.hotmap/config.json` when present. The include and
//! exclude lists can be replaced through the environment, which is read
//! once when the configuration is loaded.

use crate::error::WatchError;
use crate::filter::{parse_prefix_list, PathFilter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory holding hotmap's per-project files.
pub const CONFIG_DIR: &str = ".hotmap";
pub const CONFIG_FILE: &str = "config.json";

pub const INCLUDES_ENV: &str = "HOTMAP_INCLUDES";
pub const EXCLUDES_ENV: &str = "HOTMAP_EXCLUDES";

const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory tree to watch. Never written to the file.
    #[serde(skip)]
    pub root: PathBuf,

    /// Path prefixes that are kept even when excluded.
    pub includes: Vec<String>,

    /// Path prefixes that are dropped.
    pub excludes: Vec<String>,

    /// How long a path must be quiet before its change is dispatched.
    pub debounce_ms: u64,

    /// Sleep between polls when no raw events are pending.
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            includes: Vec::new(),
            excludes: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WatchConfig {
    /// Default configuration for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads the configuration for `root`, then applies environment
    /// overrides.
    pub fn load(root: &Path) -> Result<Self, WatchError> {
        let mut config = Self::load_file(root)?;
        config.apply_overrides(
            std::env::var(INCLUDES_ENV).ok().as_deref(),
            std::env::var(EXCLUDES_ENV).ok().as_deref(),
        );
        Ok(config)
    }

    /// Loads `<root>/.hotmap/config.json`, or the defaults if it does not
    /// exist.
    pub fn load_file(root: &Path) -> Result<Self, WatchError> {
        let path = Self::path_for(root);
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::new(root));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| WatchError::io(&path, e))?;
        let mut config: Self = serde_json::from_str(&text).map_err(|e| WatchError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        config.root = root.to_path_buf();

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replaces the prefix lists with non-empty override values.
    pub fn apply_overrides(&mut self, includes: Option<&str>, excludes: Option<&str>) {
        if let Some(list) = includes.map(parse_prefix_list).filter(|l| !l.is_empty()) {
            self.includes = list;
        }
        if let Some(list) = excludes.map(parse_prefix_list).filter(|l| !l.is_empty()) {
            self.excludes = list;
        }
    }

    /// Writes the configuration under its root, creating `.hotmap/`.
    pub fn save(&self) -> Result<PathBuf, WatchError> {
        let path = Self::path_for(&self.root);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| WatchError::io(dir, e))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| WatchError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| WatchError::io(&path, e))?;
        Ok(path)
    }

    pub fn filter(&self) -> PathFilter {
        PathFilter::new(self.includes.iter().cloned(), self.excludes.iter().cloned())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
