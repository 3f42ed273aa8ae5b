//! Failures of the supervisor, the runtime loop and replay.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// `path` names the file, or a pseudo path such as `stdout` or `events`.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executable could not be started at all; no process exists.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not send SIGTERM to pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] syncwarden_core::ConfigError),

    /// Encoding a notification for `--json` output.
    #[error("notification encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
