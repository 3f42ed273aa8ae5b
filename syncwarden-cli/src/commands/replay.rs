//! `syncwarden replay <FILE|-> [--notify KIND,...] [--json]`

use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use syncwarden_core::{config, NotificationKind};
use syncwarden_daemon::{replay, replay_file};

use super::{home, notify_override};

/// Run recorded connection events through the notifier, without a daemon.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of connection events; `-` for stdin.
    pub file: PathBuf,

    /// Notifications to enable (comma separated). Defaults to the configured set.
    #[arg(long, value_delimiter = ',', value_name = "KIND")]
    pub notify: Vec<NotificationKind>,

    /// Print notifications as JSON lines.
    #[arg(long)]
    pub json: bool,
}

impl ReplayArgs {
    pub fn run(self) -> Result<()> {
        let enabled = match notify_override(&self.notify) {
            Some(enabled) => enabled,
            None => {
                let home = home()?;
                config::load_or_default_at(&home)
                    .context("failed to load config")?
                    .enabled_notifications
            }
        };

        let stdout = io::stdout().lock();
        let summary = if self.file.as_os_str() == "-" {
            replay(enabled, self.json, BufReader::new(io::stdin().lock()), stdout)
        } else {
            replay_file(&self.file, enabled, self.json, stdout)
        }
        .with_context(|| format!("failed to replay '{}'", self.file.display()))?;

        eprintln!(
            "{} events, {} notifications",
            summary.events, summary.notifications
        );
        Ok(())
    }
}
