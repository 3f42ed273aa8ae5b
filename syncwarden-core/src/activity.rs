//! Read-only view of "is the daemon up, and since when".
//!
//! The notifier consults an [`ActivitySource`] to decide whether a disconnect
//! is worth reporting. Two providers exist: the process supervisor (through a
//! [`ProcessHandle`]) and, optionally, a host service manager implemented
//! outside this workspace. Neither is owned by the notifier; the caller keeps
//! them alive.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Running/activity queries shared by every daemon provider.
pub trait ActivitySource: Send + Sync {
    fn is_running(&self) -> bool;

    /// Time the daemon was observed starting, `None` while it is not running.
    fn active_since(&self) -> Option<DateTime<Utc>>;

    /// Whether the last termination was requested by us rather than a crash.
    fn is_manually_stopped(&self) -> bool;

    /// `true` iff the daemon has been active for strictly more than
    /// `at_least_seconds` at `now`.
    fn is_active_for(&self, at_least_seconds: u32, now: DateTime<Utc>) -> bool {
        self.active_since()
            .is_some_and(|since| now - since > Duration::seconds(i64::from(at_least_seconds)))
    }
}

// ---------------------------------------------------------------------------
// Process snapshot
// ---------------------------------------------------------------------------

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    #[default]
    NotRunning,
    Starting,
    Running,
    StoppingGraceful,
    StoppingForced,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotRunning => write!(f, "not-running"),
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::StoppingGraceful => write!(f, "stopping-graceful"),
            ProcessState::StoppingForced => write!(f, "stopping-forced"),
        }
    }
}

/// Everything a reader may know about the supervised process at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_since: Option<DateTime<Utc>>,
    pub manually_stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Non-owning, read-only handle on a supervisor's published state.
///
/// Cloning is cheap; every clone observes the latest snapshot. The supervisor
/// is the only writer.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    rx: watch::Receiver<ProcessSnapshot>,
}

impl ProcessHandle {
    pub fn new(rx: watch::Receiver<ProcessSnapshot>) -> Self {
        Self { rx }
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> ProcessState {
        self.rx.borrow().state
    }

    /// `true` when both handles observe the same supervisor.
    pub fn same_source(&self, other: &ProcessHandle) -> bool {
        self.rx.same_channel(&other.rx)
    }
}

impl ActivitySource for ProcessHandle {
    fn is_running(&self) -> bool {
        self.rx.borrow().state != ProcessState::NotRunning
    }

    fn active_since(&self) -> Option<DateTime<Utc>> {
        self.rx.borrow().active_since
    }

    fn is_manually_stopped(&self) -> bool {
        self.rx.borrow().manually_stopped
    }
}
