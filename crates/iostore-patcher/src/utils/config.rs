//! Application configuration stored next to the executable.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_LOG_FILE_NAME: &str = "iostore-patcher.log";

/// Application-wide configuration stored in config.toml.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory scanned by `patch` when no directory is given.
    pub mods_dir: Option<Utf8PathBuf>,
    /// Where the file log goes. Defaults to `iostore-patcher.log` beside the executable.
    pub log_file: Option<Utf8PathBuf>,
    pub file_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mods_dir: None,
            log_file: None,
            file_logging: true,
        }
    }
}

impl AppConfig {
    /// The configured log file, or the default one beside the executable.
    pub fn resolved_log_file(&self) -> Option<Utf8PathBuf> {
        self.log_file
            .clone()
            .or_else(|| install_dir().map(|dir| dir.join(DEFAULT_LOG_FILE_NAME)))
    }
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default configuration file path (config.toml).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads the application configuration from config.toml.
/// Returns default configuration if file doesn't exist or cannot be parsed.
pub fn load_config() -> AppConfig {
    default_config_path()
        .map(|path| load_config_from(&path))
        .unwrap_or_default()
}

/// Like [`read_config`], but falls back to defaults. Runs before logging is
/// initialised, so problems go to stderr.
pub fn load_config_from(path: &Utf8Path) -> AppConfig {
    read_config(path).unwrap_or_else(|err| {
        eprintln!("Ignoring config {}: {}", path, err);
        AppConfig::default()
    })
}

/// Reads config.toml at `path`. A missing file gives the defaults.
pub fn read_config(path: &Utf8Path) -> io::Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Saves the application configuration to config.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    let path = default_config_path().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not determine config path")
    })?;
    save_config_to(&path, cfg)
}

pub fn save_config_to(path: &Utf8Path, cfg: &AppConfig) -> io::Result<()> {
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path, content)
}
