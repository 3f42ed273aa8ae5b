//! SyncWarden core library: domain types, configuration, clock and activity seams.
//!
//! Public API surface:
//! - [`types`]: connection status, device/directory references, connection events
//! - [`kind`]: [`NotificationKind`] flag set
//! - [`activity`]: [`ActivitySource`] capability and the published process snapshot
//! - [`clock`]: [`Clock`] abstraction over wall-clock time, standby detection
//! - [`config`]: load / save / init of `~/.syncwarden/config.yaml`
//! - [`error`]: [`ConfigError`]

pub mod activity;
pub mod clock;
pub mod config;
pub mod error;
pub mod kind;
pub mod types;

pub use activity::{ActivitySource, ProcessHandle, ProcessSnapshot, ProcessState};
pub use clock::{Clock, ManualClock, SystemClock, WakeDetector};
pub use config::Config;
pub use error::ConfigError;
pub use kind::NotificationKind;
pub use types::{ConnectionEvent, ConnectionStatus, DeviceId, DeviceRef, DirId, DirectoryRef};
