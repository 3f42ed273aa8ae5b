//! OS process plumbing behind the supervisor.
//!
//! A [`ProcessBackend`] launches and signals the daemon executable. It never
//! touches supervisor state; everything it observes is reported back as a
//! [`ProcessEvent`] on the channel handed to [`ProcessBackend::spawn`].

use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::DaemonError;

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitStatus {
    /// Exited on its own with an exit code.
    Normal,
    /// Terminated by a signal or lost track of.
    Crashed,
}

/// Everything the supervisor reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Started {
        pid: Option<u32>,
    },
    Finished {
        exit_code: Option<i32>,
        exit_status: ExitStatus,
    },
    /// Runtime error while waiting on the child. A `Finished` follows.
    Errored {
        message: String,
    },
    /// The kill timer armed with `generation` expired.
    KillTimeout {
        generation: u64,
    },
}

pub type ProcessEventSender = mpsc::UnboundedSender<ProcessEvent>;

/// Launches and signals one child process at a time.
pub trait ProcessBackend: Send {
    /// Launch `program`. `Started` and later `Finished` are reported on `events`.
    fn spawn(
        &mut self,
        program: &str,
        arguments: &[String],
        events: ProcessEventSender,
    ) -> Result<(), DaemonError>;

    /// Ask the running child to quit (SIGTERM on unix).
    fn terminate(&mut self) -> Result<(), DaemonError>;

    /// Force the running child to quit.
    fn kill(&mut self) -> Result<(), DaemonError>;
}

// ---------------------------------------------------------------------------
// Tokio backend
// ---------------------------------------------------------------------------

struct ChildControl {
    pid: Option<u32>,
    kill_tx: mpsc::UnboundedSender<()>,
}

/// Runs the daemon as a `tokio::process` child.
#[derive(Default)]
pub struct TokioBackend {
    child: Option<ChildControl>,
}

impl TokioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pid of the most recently spawned child.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.pid)
    }
}

impl ProcessBackend for TokioBackend {
    fn spawn(
        &mut self,
        program: &str,
        arguments: &[String],
        events: ProcessEventSender,
    ) -> Result<(), DaemonError> {
        let mut child = Command::new(program)
            .args(arguments)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DaemonError::Launch {
                program: program.to_string(),
                source,
            })?;

        let pid = child.id();
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
        self.child = Some(ChildControl { pid, kill_tx });
        let _ = events.send(ProcessEvent::Started { pid });

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Some(()) = kill_rx.recv() => {
                    if let Err(err) = child.start_kill() {
                        tracing::warn!(error = %err, "failed to kill child");
                    }
                    child.wait().await
                }
            };
            let finished = match status {
                Ok(status) => ProcessEvent::Finished {
                    exit_code: status.code(),
                    exit_status: if status.code().is_some() {
                        ExitStatus::Normal
                    } else {
                        ExitStatus::Crashed
                    },
                },
                Err(err) => {
                    let _ = events.send(ProcessEvent::Errored {
                        message: err.to_string(),
                    });
                    ProcessEvent::Finished {
                        exit_code: None,
                        exit_status: ExitStatus::Crashed,
                    }
                }
            };
            let _ = events.send(finished);
        });

        Ok(())
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<(), DaemonError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid() else {
            return Ok(());
        };
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // Already gone; its `Finished` is on the way.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(DaemonError::Signal {
                pid,
                source: errno.into(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<(), DaemonError> {
        self.kill()
    }

    fn kill(&mut self) -> Result<(), DaemonError> {
        if let Some(child) = &self.child {
            if child.kill_tx.send(()).is_err() {
                tracing::debug!(pid = ?child.pid, "kill requested after child exited");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------
