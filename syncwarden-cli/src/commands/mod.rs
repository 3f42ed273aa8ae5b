pub mod config;
pub mod replay;
pub mod run;

use anyhow::{Context, Result};
use std::path::PathBuf;

use syncwarden_core::NotificationKind;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Combine `--notify` values; `None` when the flag was not given.
pub(crate) fn notify_override(kinds: &[NotificationKind]) -> Option<NotificationKind> {
    if kinds.is_empty() {
        None
    } else {
        Some(kinds.iter().copied().collect())
    }
}
