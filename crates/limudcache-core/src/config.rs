//! Application configuration management.
//!
//! Configuration is stored at `~/.config/limudcache/config.json`; the cache
//! and the legacy blob live under `~/.cache/limudcache/`. The API and probe
//! URLs can be overridden with `LIMUDCACHE_API_URL` and
//! `LIMUDCACHE_PROBE_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_API_BASE_URL;
use crate::models::{default_paths, StudyPath};
use crate::progress::PROGRESS_FILE;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "limudcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Legacy single-blob cache written by earlier versions
const LEGACY_BLOB_FILE: &str = "legacy-cache.json";

pub const API_URL_ENV: &str = "LIMUDCACHE_API_URL";
pub const PROBE_URL_ENV: &str = "LIMUDCACHE_PROBE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub interval_minutes: u64,
    /// Days ahead, starting today, covered by prefetch and near-term refresh.
    pub prefetch_days: u32,
    pub retention_days: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            prefetch_days: 3,
            retention_days: 30,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub probe_url: Option<String>,
    pub active_path: String,
    pub study_paths: Vec<StudyPath>,
    /// The user chose to work offline.
    pub offline_mode: bool,
    pub sync: SyncSettings,
    pub legacy_blob: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            probe_url: None,
            active_path: "daf-yomi".to_string(),
            study_paths: default_paths(),
            offline_mode: false,
            sync: SyncSettings::default(),
            legacy_blob: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn legacy_blob_path(&self) -> Result<PathBuf> {
        match &self.legacy_blob {
            Some(path) => Ok(path.clone()),
            None => Ok(self.cache_dir()?.join(LEGACY_BLOB_FILE)),
        }
    }

    pub fn progress_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(PROGRESS_FILE))
    }

    /// Environment, then config file, then the public provider.
    pub fn api_base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    /// Defaults to the API base URL.
    pub fn probe_url(&self) -> String {
        std::env::var(PROBE_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.probe_url.clone())
            .unwrap_or_else(|| self.api_base_url())
    }

    pub fn find_path(&self, id: &str) -> Option<&StudyPath> {
        self.study_paths.iter().find(|p| p.id == id)
    }

    pub fn active(&self) -> Option<&StudyPath> {
        self.find_path(&self.active_path)
    }

    pub fn remote_paths(&self) -> impl Iterator<Item = &StudyPath> {
        self.study_paths.iter().filter(|p| !p.is_local())
    }
}
