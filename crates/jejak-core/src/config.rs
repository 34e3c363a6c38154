//! Project configuration.
//!
//! Loaded from `.jejak/config.toml` under the project root. A missing file
//! yields defaults; a malformed file is an error (silently falling back to
//! defaults would mask a typo in the retention window).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the directory holding the ledger and config.
pub const PROJECT_DIR: &str = ".jejak";

/// Ledger file name inside [`PROJECT_DIR`].
pub const LEDGER_FILE: &str = "ledger.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Debounce window, in seconds, for folding cascaded saves.
    #[serde(default = "default_merge_window_secs")]
    pub merge_window_secs: u64,
    /// Realization-ledger retention, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            merge_window_secs: default_merge_window_secs(),
            retention_days: default_retention_days(),
        }
    }
}

impl TrackingConfig {
    /// Merge window as a [`Duration`].
    #[must_use]
    pub const fn merge_window(&self) -> Duration {
        Duration::from_secs(self.merge_window_secs)
    }

    /// Retention window as a [`Duration`].
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

const fn default_merge_window_secs() -> u64 {
    2
}

const fn default_retention_days() -> u64 {
    365
}

/// Path of the ledger file under `project_root`.
#[must_use]
pub fn ledger_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join(LEDGER_FILE)
}

/// Path of the config file under `project_root`.
#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("config.toml")
}

/// Load the tracking config, falling back to defaults when the file is
/// absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<TrackingConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(TrackingConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<TrackingConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write the given config to `.jejak/config.toml`, creating the directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub fn write_config(project_root: &Path, config: &TrackingConfig) -> Result<()> {
    let path = config_path(project_root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to encode config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}
