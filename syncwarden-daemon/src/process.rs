//! Supervisor for the synchronization daemon process.
//!
//! Owns the lifecycle state machine:
//!
//! ```text
//! NotRunning ──start──▶ Starting ──Started──▶ Running
//!     ▲                                         │ stop / restart     kill
//!     │                                         ▼                     │
//!     └────────Finished──────── StoppingGraceful ──ConfirmKill+kill──▶ StoppingForced
//! ```
//!
//! All mutation happens on the task driving [`SyncthingProcess::handle_event`];
//! the backend and the kill timer only send [`ProcessEvent`]s. Readers observe
//! the state through a [`ProcessHandle`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use syncwarden_core::config::DEFAULT_KILL_TIMEOUT_SECS;
use syncwarden_core::{
    ActivitySource, Clock, ProcessHandle, ProcessSnapshot, ProcessState, SystemClock,
};

use crate::backend::{ExitStatus, ProcessBackend, ProcessEvent, ProcessEventSender};
use crate::error::DaemonError;

const SIGNAL_CAPACITY: usize = 64;

/// Signals the supervisor emits for its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorSignal {
    /// A graceful stop did not finish in time; the owner decides whether to kill.
    ConfirmKill,
    StateChanged(ProcessState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    program: String,
    arguments: Vec<String>,
}

pub struct SyncthingProcess<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    kill_timeout: Duration,
    state: ProcessState,
    program: String,
    arguments: Vec<String>,
    active_since: Option<DateTime<Utc>>,
    pid: Option<u32>,
    manually_stopped: bool,
    pending_restart: Option<Invocation>,
    kill_timer: Option<JoinHandle<()>>,
    kill_generation: u64,
    events_tx: ProcessEventSender,
    snapshot_tx: watch::Sender<ProcessSnapshot>,
    signals_tx: broadcast::Sender<SupervisorSignal>,
}

impl<B: ProcessBackend> SyncthingProcess<B> {
    /// Supervisor on the system clock with the default kill timeout.
    ///
    /// The returned receiver yields every [`ProcessEvent`]; feed each one back
    /// into [`Self::handle_event`].
    pub fn new(backend: B) -> (Self, mpsc::UnboundedReceiver<ProcessEvent>) {
        Self::with_options(
            backend,
            Arc::new(SystemClock),
            Duration::from_secs(DEFAULT_KILL_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        backend: B,
        clock: Arc<dyn Clock>,
        kill_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ProcessEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ProcessSnapshot::default());
        let (signals_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        let process = Self {
            backend,
            clock,
            kill_timeout,
            state: ProcessState::NotRunning,
            program: String::new(),
            arguments: Vec::new(),
            active_since: None,
            pid: None,
            manually_stopped: false,
            pending_restart: None,
            kill_timer: None,
            kill_generation: 0,
            events_tx,
            snapshot_tx,
            signals_tx,
        };
        (process, events_rx)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != ProcessState::NotRunning
    }

    pub fn active_since(&self) -> Option<DateTime<Utc>> {
        self.active_since
    }

    /// `true` iff running for strictly more than `seconds`.
    pub fn is_active_for(&self, seconds: u32) -> bool {
        self.handle().is_active_for(seconds, self.clock.now())
    }

    pub fn is_manually_stopped(&self) -> bool {
        self.manually_stopped
    }

    /// Program of the current (or last) invocation.
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn kill_timeout(&self) -> Duration {
        self.kill_timeout
    }

    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle::new(self.snapshot_tx.subscribe())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorSignal> {
        self.signals_tx.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Launch the daemon unless it is already running.
    pub fn start_syncthing(
        &mut self,
        program: impl Into<String>,
        arguments: Vec<String>,
    ) -> Result<(), DaemonError> {
        if self.is_running() {
            tracing::debug!(state = %self.state, "start ignored; already running");
            return Ok(());
        }
        self.program = program.into();
        self.arguments = arguments;
        self.launch()
    }

    /// Request a graceful exit. Drops any pending restart.
    pub fn stop_syncthing(&mut self) -> Result<(), DaemonError> {
        if !self.is_running() {
            return Ok(());
        }
        if self.pending_restart.take().is_some() {
            tracing::info!("pending restart dropped by stop request");
        }
        self.manually_stopped = true;
        if self.state == ProcessState::StoppingForced {
            return Ok(());
        }
        self.set_state(ProcessState::StoppingGraceful);
        self.arm_kill_timer();
        tracing::info!(pid = ?self.pid, "stopping daemon");
        self.backend.terminate()
    }

    /// Force the daemon to exit now.
    pub fn kill_syncthing(&mut self) -> Result<(), DaemonError> {
        if !self.is_running() {
            return Ok(());
        }
        self.manually_stopped = true;
        self.cancel_kill_timer();
        self.set_state(ProcessState::StoppingForced);
        tracing::warn!(pid = ?self.pid, "killing daemon");
        self.backend.kill()
    }

    /// Stop the running daemon and launch it again with the given invocation
    /// once it has finished. Starts directly when nothing is running.
    pub fn restart_syncthing(
        &mut self,
        program: impl Into<String>,
        arguments: Vec<String>,
    ) -> Result<(), DaemonError> {
        let invocation = Invocation {
            program: program.into(),
            arguments,
        };
        if !self.is_running() {
            return self.start_syncthing(invocation.program, invocation.arguments);
        }
        self.pending_restart = Some(invocation);
        self.manually_stopped = true;
        self.arm_kill_timer();
        self.publish();
        if matches!(
            self.state,
            ProcessState::StoppingGraceful | ProcessState::StoppingForced
        ) {
            return Ok(());
        }
        self.set_state(ProcessState::StoppingGraceful);
        tracing::info!(pid = ?self.pid, "restarting daemon");
        self.backend.terminate()
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: ProcessEvent) -> Result<(), DaemonError> {
        match event {
            ProcessEvent::Started { pid } => {
                self.handle_started(pid);
                Ok(())
            }
            ProcessEvent::Finished {
                exit_code,
                exit_status,
            } => self.handle_finished(exit_code, exit_status),
            ProcessEvent::Errored { message } => {
                tracing::warn!(pid = ?self.pid, error = %message, "daemon process error");
                Ok(())
            }
            ProcessEvent::KillTimeout { generation } => {
                self.handle_kill_timeout(generation);
                Ok(())
            }
        }
    }

    fn handle_started(&mut self, pid: Option<u32>) {
        self.active_since = Some(self.clock.now());
        self.pid = pid;
        tracing::info!(program = %self.program, pid = ?pid, "daemon started");
        if self.state == ProcessState::Starting {
            self.set_state(ProcessState::Running);
        } else {
            // Stop requested before the launch was confirmed; keep stopping.
            self.publish();
        }
    }

    fn handle_finished(
        &mut self,
        exit_code: Option<i32>,
        exit_status: ExitStatus,
    ) -> Result<(), DaemonError> {
        tracing::info!(
            pid = ?self.pid,
            exit_code = ?exit_code,
            exit_status = ?exit_status,
            manually_stopped = self.manually_stopped,
            "daemon finished",
        );
        self.active_since = None;
        self.pid = None;
        self.cancel_kill_timer();
        self.set_state(ProcessState::NotRunning);

        match self.pending_restart.take() {
            Some(invocation) => {
                self.program = invocation.program;
                self.arguments = invocation.arguments;
                self.launch()
            }
            None => Ok(()),
        }
    }

    fn handle_kill_timeout(&mut self, generation: u64) {
        if generation != self.kill_generation || self.kill_timer.is_none() {
            tracing::debug!(generation, current = self.kill_generation, "stale kill timeout");
            return;
        }
        self.kill_timer = None;
        if !self.is_running() {
            return;
        }
        tracing::warn!(
            pid = ?self.pid,
            timeout_secs = self.kill_timeout.as_secs(),
            "daemon did not exit in time; kill needs confirmation",
        );
        let _ = self.signals_tx.send(SupervisorSignal::ConfirmKill);
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn launch(&mut self) -> Result<(), DaemonError> {
        self.manually_stopped = false;
        self.cancel_kill_timer();
        self.set_state(ProcessState::Starting);
        tracing::info!(program = %self.program, arguments = ?self.arguments, "launching daemon");
        let result = self
            .backend
            .spawn(&self.program, &self.arguments, self.events_tx.clone());
        if let Err(err) = result {
            tracing::error!(program = %self.program, error = %err, "launch failed");
            self.set_state(ProcessState::NotRunning);
            return Err(err);
        }
        Ok(())
    }

    /// Supersedes any previous timer.
    fn arm_kill_timer(&mut self) {
        self.cancel_kill_timer();
        let generation = self.kill_generation;
        let timeout = self.kill_timeout;
        let events = self.events_tx.clone();
        self.kill_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(ProcessEvent::KillTimeout { generation });
        }));
    }

    fn cancel_kill_timer(&mut self) {
        if let Some(timer) = self.kill_timer.take() {
            timer.abort();
        }
        // An expiry already queued must not match any later timer.
        self.kill_generation += 1;
    }

    fn set_state(&mut self, state: ProcessState) {
        let changed = self.state != state;
        self.state = state;
        self.publish();
        if changed {
            let _ = self.signals_tx.send(SupervisorSignal::StateChanged(state));
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(ProcessSnapshot {
            state: self.state,
            active_since: self.active_since,
            manually_stopped: self.manually_stopped,
            pid: self.pid,
        });
    }
}

impl<B> Drop for SyncthingProcess<B> {
    fn drop(&mut self) {
        if let Some(timer) = self.kill_timer.take() {
            timer.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Main instance
// ---------------------------------------------------------------------------

static MAIN_INSTANCE: RwLock<Option<ProcessHandle>> = RwLock::new(None);

/// Handle on the supervisor registered by the running application, if any.
pub fn main_instance() -> Option<ProcessHandle> {
    MAIN_INSTANCE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Register (or with `None`, clear) the application-wide supervisor handle.
///
/// The runtime registers its supervisor on startup and clears the slot before
/// returning.
pub fn set_main_instance(handle: Option<ProcessHandle>) {
    *MAIN_INSTANCE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = handle;
}
