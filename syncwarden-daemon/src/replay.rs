//! Offline replay of a recorded connection event stream through an aggregator.

use std::io::{BufRead, Write};
use std::path::Path;

use syncwarden_core::NotificationKind;
use syncwarden_notifier::SyncthingNotifier;

use crate::error::{io_err, DaemonError};
use crate::runtime::{format_notification, handle_event_line, LOCAL_CONNECTION};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub notifications: usize,
}

/// Feed every JSON line of `input` to a fresh aggregator with no supervisor
/// bound and write the resulting notifications to `output`, one per line.
pub fn replay<R: BufRead, W: Write>(
    enabled: NotificationKind,
    json: bool,
    input: R,
    mut output: W,
) -> Result<ReplaySummary, DaemonError> {
    let mut notifier = SyncthingNotifier::new(LOCAL_CONNECTION);
    notifier.set_enabled_notifications(enabled);
    let mut rx = notifier.subscribe();
    let mut summary = ReplaySummary::default();

    for line in input.lines() {
        let line = line.map_err(|e| io_err("events", e))?;
        if handle_event_line(&mut notifier, &line) {
            summary.events += 1;
        }
        while let Ok(notification) = rx.try_recv() {
            let text = format_notification(&notification, json)?;
            writeln!(output, "{text}").map_err(|e| io_err("output", e))?;
            summary.notifications += 1;
        }
    }
    output.flush().map_err(|e| io_err("output", e))?;
    Ok(summary)
}

/// [`replay`] reading from a file.
pub fn replay_file<W: Write>(
    path: &Path,
    enabled: NotificationKind,
    json: bool,
    output: W,
) -> Result<ReplaySummary, DaemonError> {
    let file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    replay(enabled, json, std::io::BufReader::new(file), output)
}
