//! Failures while reading or writing `~/.syncwarden/config.yaml`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file, or creating the directory and swapping in a new file, failed.
    #[error("config file access failed: {0}")]
    Io(#[from] std::io::Error),

    /// The in-memory config could not be rendered as YAML on save.
    #[error("could not encode config as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file exists but is not a valid config; serde_yaml reports the line.
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Maps to no [`crate::NotificationKind`] flag.
    #[error("unknown notification '{name}'; expected one of: connected-disconnected, local-sync-complete, remote-sync-complete, new-device, new-dir")]
    UnknownNotification { name: String },

    #[error("no home directory to put .syncwarden/ in; set $HOME")]
    HomeNotFound,

    /// Only returned by `load_at`; `load_or_default_at` falls back to defaults.
    #[error("config not found at {path} (run `syncwarden config init`)")]
    ConfigNotFound { path: PathBuf },
}
