use std::fmt;

use serde::Serialize;
use syncwarden_core::{ConnectionStatus, DeviceId, DirId};

/// Signals emitted by [`crate::SyncthingNotifier`].
///
/// `StatusChanged` is the raw, ungated signal; the other variants are the
/// high-level notifications controlled by the enabled mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notification", rename_all = "kebab-case")]
pub enum Notification {
    /// The connection status changed. `previous` is `None` for the first event.
    StatusChanged {
        previous: Option<ConnectionStatus>,
        current: ConnectionStatus,
    },
    /// The connection to the daemon has been established.
    Connected,
    /// The connection to the daemon has been interrupted.
    Disconnected,
    /// A directory completed synchronization, locally or on a remote device.
    SyncComplete { message: String },
    /// A new device talks to us.
    NewDevice { device_id: DeviceId, message: String },
    /// A new directory is shared with us.
    NewDir {
        device_id: DeviceId,
        dir_id: DirId,
        message: String,
    },
}

impl Notification {
    /// Everything except the raw `StatusChanged` signal.
    pub fn is_high_level(&self) -> bool {
        !matches!(self, Notification::StatusChanged { .. })
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::StatusChanged {
                previous: Some(previous),
                current,
            } => write!(f, "status: {previous} -> {current}"),
            Notification::StatusChanged {
                previous: None,
                current,
            } => write!(f, "status: {current}"),
            Notification::Connected => write!(f, "connected to daemon"),
            Notification::Disconnected => write!(f, "disconnected from daemon"),
            Notification::SyncComplete { message }
            | Notification::NewDevice { message, .. }
            | Notification::NewDir { message, .. } => f.write_str(message),
        }
    }
}
