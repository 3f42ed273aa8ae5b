//! Domain types shared by the notifier and the daemon supervisor.
//!
//! The connection client itself lives outside this workspace; these types are
//! the shape of what it hands us. All of them are serializable so events can
//! be piped in as JSON lines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed device identifier as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed shared-directory identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirId(pub String);

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DirId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DirId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Connection status
// ---------------------------------------------------------------------------

/// Connectivity state of the daemon connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Reconnecting,
    Idle,
    Scanning,
    Synchronizing,
    Paused,
}

impl ConnectionStatus {
    /// `true` for every status reached while the connection is established.
    ///
    /// `Disconnected` and `Reconnecting` are the disconnected-like class; the
    /// finer states are not interpreted beyond this split.
    pub fn is_connected(self) -> bool {
        !matches!(
            self,
            ConnectionStatus::Disconnected | ConnectionStatus::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
            ConnectionStatus::Idle => write!(f, "idle"),
            ConnectionStatus::Scanning => write!(f, "scanning"),
            ConnectionStatus::Synchronizing => write!(f, "synchronizing"),
            ConnectionStatus::Paused => write!(f, "paused"),
        }
    }
}

// ---------------------------------------------------------------------------
// Device / directory references
// ---------------------------------------------------------------------------

/// What the connection knows about a device. `name` is absent for devices
/// that were never configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DeviceRef {
    pub fn new(id: impl Into<DeviceId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// Configured name, or the raw id when the name is missing or blank.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.id.0,
        }
    }
}

/// What the connection knows about a shared directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRef {
    pub id: DirId,
    #[serde(default)]
    pub label: String,
}

impl DirectoryRef {
    pub fn new(id: impl Into<DirId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Label, or the raw id when no label is set.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id.0
        } else {
            &self.label
        }
    }
}

// ---------------------------------------------------------------------------
// Connection events
// ---------------------------------------------------------------------------

/// Raw events delivered by the daemon connection, in arrival order.
///
/// Serialized as one JSON object per event with an `event` tag, e.g.
/// `{"event":"status-changed","status":"idle"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ConnectionEvent {
    /// The connection moved to `status`.
    StatusChanged { status: ConnectionStatus },
    /// A device we have never seen tried to connect.
    NewDevice {
        when: DateTime<Utc>,
        device_id: DeviceId,
        address: String,
    },
    /// A device offered to share a directory we do not have yet.
    NewDirectory {
        when: DateTime<Utc>,
        device_id: DeviceId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device: Option<DeviceRef>,
        dir_id: DirId,
        #[serde(default)]
        dir_label: String,
    },
    /// A directory finished synchronizing. `remote_device` is `None` when the
    /// local instance completed, `Some` when that remote device did.
    DirectoryCompleted {
        when: DateTime<Utc>,
        directory: DirectoryRef,
        #[serde(default)]
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_device: Option<DeviceRef>,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
