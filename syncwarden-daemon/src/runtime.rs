//! Foreground runtime: one supervisor, one aggregator, one event loop.
//!
//! The loop multiplexes three inputs:
//! - process events from the backend and the kill timer
//! - connection events, one JSON object per line
//! - runtime commands (restart on SIGHUP, stop on Ctrl-C)
//! - a periodic standby check while a grace window is configured
//!
//! Notifications are written to the output after every handled input.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use syncwarden_core::{Clock, Config, ConnectionEvent, NotificationKind, SystemClock, WakeDetector};
use syncwarden_notifier::{Notification, SyncthingNotifier};

use crate::backend::{ProcessBackend, ProcessEvent, TokioBackend};
use crate::error::{io_err, DaemonError};
use crate::process::{set_main_instance, SupervisorSignal, SyncthingProcess};

/// Name of the single connection the runtime aggregates.
pub const LOCAL_CONNECTION: &str = "local";

const WAKE_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const WAKE_THRESHOLD_SECS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub program: String,
    pub arguments: Vec<String>,
    pub enabled_notifications: NotificationKind,
    pub ignore_inavailability_after_start: u32,
    pub kill_timeout: Duration,
    pub auto_confirm_kill: bool,
    /// Print notifications as JSON lines instead of text.
    pub json: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.program.clone(),
            arguments: config.arguments.clone(),
            enabled_notifications: config.enabled_notifications,
            ignore_inavailability_after_start: config.ignore_inavailability_after_start,
            kill_timeout: Duration::from_secs(config.kill_timeout_secs),
            auto_confirm_kill: config.auto_confirm_kill,
            json: false,
        }
    }
}

/// Where connection events come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    None,
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCommand {
    /// Restart the daemon with the configured invocation.
    Restart,
    /// Stop the daemon; a second request kills it.
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: usize,
    pub notifications: usize,
    pub restarts: usize,
    pub exit_code: Option<i32>,
}

/// Start the runtime and block the current thread until the daemon exits.
pub fn start_blocking(options: RunOptions, events: EventSource) -> Result<RunSummary, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options, events))
}

/// Supervise the configured daemon with the real process backend, printing
/// notifications to stdout.
pub async fn run(options: RunOptions, events: EventSource) -> Result<RunSummary, DaemonError> {
    let reader = open_events(&events).await?;
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let signal_task = spawn_signal_forwarder(commands_tx);

    let runtime = Runtime::new(TokioBackend::new(), Arc::new(SystemClock), options);
    set_main_instance(Some(runtime.process().handle()));
    let result = runtime
        .run(reader, tokio::io::stdout(), commands_rx)
        .await;
    set_main_instance(None);
    signal_task.abort();
    result
}

pub struct Runtime<B> {
    process: SyncthingProcess<B>,
    process_events: mpsc::UnboundedReceiver<ProcessEvent>,
    notifier: SyncthingNotifier,
    clock: Arc<dyn Clock>,
    options: RunOptions,
}

impl<B: ProcessBackend> Runtime<B> {
    pub fn new(backend: B, clock: Arc<dyn Clock>, options: RunOptions) -> Self {
        let (process, process_events) =
            SyncthingProcess::with_options(backend, clock.clone(), options.kill_timeout);
        let mut notifier = SyncthingNotifier::with_clock(LOCAL_CONNECTION, clock.clone());
        notifier.set_enabled_notifications(options.enabled_notifications);
        notifier.set_ignore_inavailability_after_start(options.ignore_inavailability_after_start);
        notifier.set_process(Some(process.handle()));
        Self {
            process,
            process_events,
            notifier,
            clock,
            options,
        }
    }

    pub fn process(&self) -> &SyncthingProcess<B> {
        &self.process
    }

    /// Launch the daemon and drive everything until it has exited.
    pub async fn run<R, W>(
        self,
        events: R,
        mut output: W,
        mut commands: mpsc::UnboundedReceiver<RuntimeCommand>,
    ) -> Result<RunSummary, DaemonError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Runtime {
            mut process,
            mut process_events,
            mut notifier,
            clock,
            options,
        } = self;
        let mut notifications = notifier.subscribe();
        let mut signals = process.subscribe();
        let mut lines = events.lines();
        let mut events_open = true;
        let mut shutting_down = false;
        let mut summary = RunSummary::default();

        let watch_standby = options.ignore_inavailability_after_start > 0;
        let mut wake_check = tokio::time::interval(WAKE_CHECK_INTERVAL);
        wake_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut wake = WakeDetector::new(
            chrono::Duration::seconds(WAKE_THRESHOLD_SECS),
            clock.now(),
            tokio::time::Instant::now().into_std(),
        );

        process.start_syncthing(options.program.clone(), options.arguments.clone())?;

        loop {
            tokio::select! {
                biased;

                Some(event) = process_events.recv() => {
                    if let ProcessEvent::Finished { exit_code, .. } = &event {
                        summary.exit_code = *exit_code;
                    }
                    process.handle_event(event)?;
                }
                line = lines.next_line(), if events_open => {
                    match line.map_err(|e| io_err("events", e))? {
                        Some(line) => {
                            if handle_event_line(&mut notifier, &line) {
                                summary.events += 1;
                            }
                        }
                        None => {
                            tracing::debug!("event stream closed");
                            events_open = false;
                        }
                    }
                }
                Some(command) = commands.recv() => match command {
                    RuntimeCommand::Restart if shutting_down => {
                        tracing::info!("restart ignored while shutting down");
                    }
                    RuntimeCommand::Restart => {
                        summary.restarts += 1;
                        process.restart_syncthing(options.program.clone(), options.arguments.clone())?;
                    }
                    RuntimeCommand::Shutdown if shutting_down => process.kill_syncthing()?,
                    RuntimeCommand::Shutdown => {
                        shutting_down = true;
                        process.stop_syncthing()?;
                    }
                },
                _ = wake_check.tick(), if watch_standby => {
                    let monotonic = tokio::time::Instant::now().into_std();
                    if let Some(at) = wake.observe(clock.now(), monotonic) {
                        tracing::info!(woke_up_at = %at, "host resumed from standby");
                        notifier.handle_wake_up(at);
                    }
                }
                else => break,
            }

            summary.notifications +=
                flush_notifications(&mut notifications, &mut output, options.json).await?;

            while let Ok(signal) = signals.try_recv() {
                match signal {
                    SupervisorSignal::ConfirmKill if options.auto_confirm_kill => {
                        tracing::info!("kill confirmed automatically");
                        process.kill_syncthing()?;
                    }
                    SupervisorSignal::ConfirmKill => {
                        tracing::warn!("daemon is not responding; press Ctrl-C again to kill it");
                    }
                    SupervisorSignal::StateChanged(state) => {
                        tracing::debug!(state = %state, "daemon state changed");
                    }
                }
            }

            if !process.is_running() {
                tracing::info!(exit_code = ?summary.exit_code, "daemon exited; runtime stopping");
                break;
            }
        }

        Ok(summary)
    }
}

/// Feed one JSON line to the aggregator. Blank and malformed lines are skipped.
pub(crate) fn handle_event_line(notifier: &mut SyncthingNotifier, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match serde_json::from_str::<ConnectionEvent>(line) {
        Ok(event) => {
            notifier.handle_event(event);
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, line, "skipping malformed connection event");
            false
        }
    }
}

pub fn format_notification(
    notification: &Notification,
    json: bool,
) -> Result<String, DaemonError> {
    if json {
        Ok(serde_json::to_string(notification)?)
    } else {
        Ok(notification.to_string())
    }
}

async fn flush_notifications<W: AsyncWrite + Unpin>(
    notifications: &mut broadcast::Receiver<Notification>,
    output: &mut W,
    json: bool,
) -> Result<usize, DaemonError> {
    let mut written = 0;
    loop {
        let notification = match notifications.try_recv() {
            Ok(notification) => notification,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification output lagged");
                continue;
            }
            Err(_) => break,
        };
        let mut line = format_notification(&notification, json)?;
        line.push('\n');
        output
            .write_all(line.as_bytes())
            .await
            .map_err(|e| io_err("stdout", e))?;
        written += 1;
    }
    if written > 0 {
        output.flush().await.map_err(|e| io_err("stdout", e))?;
    }
    Ok(written)
}

async fn open_events(
    source: &EventSource,
) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, DaemonError> {
    Ok(match source {
        EventSource::None => Box::new(tokio::io::empty()),
        EventSource::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
        EventSource::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| io_err(path, e))?;
            Box::new(BufReader::new(file))
        }
    })
}

fn spawn_signal_forwarder(commands: mpsc::UnboundedSender<RuntimeCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut hangup = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::hangup(),
        ) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::warn!(error = %err, "SIGHUP handler unavailable");
                None
            }
        };

        loop {
            #[cfg(unix)]
            let hangup_recv = async {
                match hangup.as_mut() {
                    Some(signal) => signal.recv().await,
                    None => std::future::pending().await,
                }
            };
            #[cfg(not(unix))]
            let hangup_recv = std::future::pending::<Option<()>>();

            let command = tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "ctrl-c handler failed");
                        break;
                    }
                    tracing::info!("received ctrl-c, stopping daemon");
                    RuntimeCommand::Shutdown
                }
                Some(()) = hangup_recv => {
                    tracing::info!("received SIGHUP, restarting daemon");
                    RuntimeCommand::Restart
                }
            };
            if commands.send(command).is_err() {
                break;
            }
        }
    })
}

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
