//! YAML configuration for the supervisor and the notifier.
//!
//! # Storage layout
//!
//! ```text
//! ~/.syncwarden/          (mode 0700)
//!   config.yaml           (mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function that touches disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::kind::NotificationKind;

pub const CONFIG_DIR: &str = ".syncwarden";
pub const CONFIG_FILE: &str = "config.yaml";

/// Seconds to wait for a graceful exit before asking for a forced kill.
pub const DEFAULT_KILL_TIMEOUT_SECS: u64 = 3;

/// Persisted settings. Missing keys fall back to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Daemon executable, resolved through `PATH` when not absolute.
    pub program: String,
    pub arguments: Vec<String>,
    pub enabled_notifications: NotificationKind,
    /// Seconds after daemon start during which disconnects are not reported.
    pub ignore_inavailability_after_start: u32,
    pub kill_timeout_secs: u64,
    /// Force-kill without asking when a graceful stop times out.
    pub auto_confirm_kill: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program: "syncthing".to_string(),
            arguments: vec![
                "serve".to_string(),
                "--no-browser".to_string(),
                "--no-restart".to_string(),
            ],
            enabled_notifications: NotificationKind::CONNECTED_DISCONNECTED
                | NotificationKind::NEW_DEVICE
                | NotificationKind::NEW_DIR,
            ignore_inavailability_after_start: 15,
            kill_timeout_secs: DEFAULT_KILL_TIMEOUT_SECS,
            auto_confirm_kill: false,
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.syncwarden/`: pure, no I/O.
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR)
}

/// `<home>/.syncwarden/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join(CONFIG_FILE)
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load `<home>/.syncwarden/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Like [`load_at`], but a missing file yields the defaults.
pub fn load_or_default_at(home: &Path) -> Result<Config, ConfigError> {
    match load_at(home) {
        Err(ConfigError::ConfigNotFound { .. }) => Ok(Config::default()),
        other => other,
    }
}

/// `load_or_default_at` convenience wrapper.
pub fn load_or_default() -> Result<Config, ConfigError> {
    load_or_default_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save `config` to `<home>/.syncwarden/config.yaml`.
///
/// Write flow: serialize → `config.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = config_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name(format!("{CONFIG_FILE}.tmp"));

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write the default config if none exists.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path) -> Result<Config, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    let config = Config::default();
    save_at(home, &config)?;
    Ok(config)
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<Config, ConfigError> {
    init_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
