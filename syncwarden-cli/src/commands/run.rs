//! `syncwarden run [--program P] [--events FILE|-] [--auto-confirm-kill] [-- ARGS...]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use syncwarden_core::{config, NotificationKind};
use syncwarden_daemon::{start_blocking, EventSource, RunOptions};

use super::{home, notify_override};

/// Launch the daemon in the foreground. SIGHUP restarts it, Ctrl-C stops it
/// (a second Ctrl-C kills it).
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Daemon executable. Defaults to `program` from the config file.
    #[arg(long)]
    pub program: Option<String>,

    /// JSON-lines file of connection events to feed the notifier; `-` for stdin.
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Kill without asking when a graceful stop times out.
    #[arg(long)]
    pub auto_confirm_kill: bool,

    /// Seconds to wait for a graceful exit before asking to kill.
    #[arg(long, value_name = "SECS")]
    pub kill_timeout: Option<u64>,

    /// Seconds after start during which disconnects are not reported.
    #[arg(long, value_name = "SECS")]
    pub grace: Option<u32>,

    /// Notifications to enable (comma separated), replacing the configured set.
    #[arg(long, value_delimiter = ',', value_name = "KIND")]
    pub notify: Vec<NotificationKind>,

    /// Print notifications as JSON lines.
    #[arg(long)]
    pub json: bool,

    /// Arguments passed to the daemon, replacing the configured ones.
    #[arg(last = true)]
    pub arguments: Vec<String>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let config = config::load_or_default_at(&home).with_context(|| {
            format!(
                "failed to load {}",
                config::config_path_at(&home).display()
            )
        })?;

        let options = self.options(RunOptions::from_config(&config));
        let events = match self.events {
            None => EventSource::None,
            Some(path) if path.as_os_str() == "-" => EventSource::Stdin,
            Some(path) => EventSource::File(path),
        };

        let program = options.program.clone();
        let summary = start_blocking(options, events)
            .with_context(|| format!("supervising '{program}' failed"))?;

        match summary.exit_code {
            Some(code) => eprintln!("{program} exited with code {code}"),
            None => eprintln!("{program} exited"),
        }
        Ok(())
    }

    fn options(&self, mut options: RunOptions) -> RunOptions {
        if let Some(program) = &self.program {
            options.program = program.clone();
        }
        if !self.arguments.is_empty() {
            options.arguments = self.arguments.clone();
        }
        if let Some(enabled) = notify_override(&self.notify) {
            options.enabled_notifications = enabled;
        }
        if let Some(grace) = self.grace {
            options.ignore_inavailability_after_start = grace;
        }
        if let Some(secs) = self.kill_timeout {
            options.kill_timeout = std::time::Duration::from_secs(secs);
        }
        options.auto_confirm_kill |= self.auto_confirm_kill;
        options.json = self.json;
        options
    }
}
