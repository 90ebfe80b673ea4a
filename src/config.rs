//! TOML-backed configuration (SPEC_FULL §6): scan tuning and the IPC
//! socket path override. Absence is not an error — [`Config::load`]
//! writes defaults back on first run, matching the teacher's
//! `Config::load`/`Config::save` pattern.

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub ipc: IpcConfig,
}

/// Scan tuning, consulted directly by `fsutil::dir_size`/`scan_top_level`
/// and the scanners that call them: entries below `min_size_bytes` are
/// elided, walks are bounded to `max_depth`, and paths under
/// `excluded_paths` are skipped before a `ScanEntry` is ever built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_min_size")]
    pub min_size_bytes: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

fn default_min_size() -> u64 {
    1024 * 1024
}

fn default_max_depth() -> usize {
    3
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: default_min_size(),
            max_depth: default_max_depth(),
            excluded_paths: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// No size floor, no depth bound, no exclusions. Used where an exact
    /// total is required regardless of tuning (app bundle sizing in
    /// `appinfo::AppBundle::size`) and by unit tests that assert on raw
    /// fixture byte counts.
    pub fn unbounded() -> Self {
        Self {
            min_size_bytes: 0,
            max_depth: usize::MAX,
            excluded_paths: Vec::new(),
        }
    }
}

/// IPC server tuning (SPEC_FULL §4.7's socket path default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Override for the Unix socket path. `None` means the server
    /// binary falls back to its documented default.
    #[serde(default)]
    pub socket_path: Option<String>,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self { socket_path: None }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cleancore")
            .join("config.toml")
    }

    /// Default IPC socket path (SPEC_FULL §4.7): `$XDG_RUNTIME_DIR` when
    /// set, falling back to `~/Library/Application Support`.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
            return PathBuf::from(runtime_dir).join("cleancore.sock");
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cleancore")
            .join("cleancore.sock")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.ipc
            .socket_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_socket_path)
    }
}
