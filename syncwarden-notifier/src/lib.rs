//! High-level notifications derived from a daemon connection's event stream.
//!
//! - [`SyncthingNotifier`]: the aggregator state machine
//! - [`Notification`]: what it emits
//! - [`message`]: human-readable message formatting

pub mod message;
mod notification;
mod notifier;

pub use notification::Notification;
pub use notifier::SyncthingNotifier;
pub use syncwarden_core::NotificationKind;
