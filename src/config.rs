// FILE: src/config.rs
//! Library configuration, read from a JSON file.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "SONGLIB_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Roots scanned and watched for songs.
    pub scan_dirs: Vec<PathBuf>,
    /// Removable volumes / network shares. Songs under these can be masked.
    pub mount_roots: Vec<PathBuf>,
    /// Paths never scanned or reacted to.
    pub exclude: Vec<PathBuf>,
    pub watch: bool,
    pub debounce_ms: u64,
    /// Quiet time a newly created file needs before it is catalogued.
    pub settle_ms: u64,
    pub settle_attempts: u32,
    pub catalog_path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            scan_dirs: dirs::audio_dir().into_iter().collect(),
            mount_roots: Vec::new(),
            exclude: Vec::new(),
            watch: true,
            debounce_ms: 500,
            settle_ms: 500,
            settle_attempts: 10,
            catalog_path: default_data_dir().join("catalog.db"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("songlib")
}

/// `$SONGLIB_CONFIG`, else `<config dir>/songlib/config.json`.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("songlib")
        .join("config.json")
}

impl LibraryConfig {
    /// Load from `path`. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = serde_json::from_str(&content)?;
                config.validate()?;
                tracing::debug!("[Config] Loaded {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[Config] No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(LibraryError::Io(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.settle_attempts == 0 {
            return Err(LibraryError::Config("settle_attempts must be at least 1".into()));
        }
        for dir in self.scan_dirs.iter().chain(&self.mount_roots) {
            if dir.is_relative() {
                return Err(LibraryError::Config(format!("path must be absolute: {}", dir.display())));
            }
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
