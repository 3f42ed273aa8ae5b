//! The notification aggregator.
//!
//! Reduces the raw connection event stream to the high-level notifications a
//! user cares about. Disconnects are only reported when they cannot be blamed
//! on an intentional stop/restart or on the grace window after startup (or
//! standby wake-up) of the daemon process or service bound to the aggregator.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

use syncwarden_core::{
    ActivitySource, Clock, ConnectionEvent, ConnectionStatus, DeviceId, DeviceRef, DirId,
    DirectoryRef, NotificationKind, ProcessHandle, SystemClock,
};

use crate::message;
use crate::notification::Notification;

const CHANNEL_CAPACITY: usize = 256;

pub struct SyncthingNotifier {
    connection: String,
    clock: Arc<dyn Clock>,
    process: Option<ProcessHandle>,
    service: Option<Arc<dyn ActivitySource>>,
    enabled_notifications: NotificationKind,
    previous_status: Option<ConnectionStatus>,
    ignore_inavailability_after_start: u32,
    last_wake_up: Option<DateTime<Utc>>,
    initialized: bool,
    tx: broadcast::Sender<Notification>,
}

impl SyncthingNotifier {
    /// Creates an aggregator bound to the connection named `connection`.
    ///
    /// All notifications start disabled and the grace window is zero.
    pub fn new(connection: impl Into<String>) -> Self {
        Self::with_clock(connection, Arc::new(SystemClock))
    }

    pub fn with_clock(connection: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            connection: connection.into(),
            clock,
            process: None,
            service: None,
            enabled_notifications: NotificationKind::NONE,
            previous_status: None,
            ignore_inavailability_after_start: 0,
            last_wake_up: None,
            initialized: false,
            tx,
        }
    }

    /// Name of the connection this aggregator is bound to.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn enabled_notifications(&self) -> NotificationKind {
        self.enabled_notifications
    }

    /// Takes effect on the next event; nothing is re-evaluated.
    pub fn set_enabled_notifications(&mut self, enabled: NotificationKind) {
        self.enabled_notifications = enabled;
    }

    /// Seconds after daemon start (or wake-up) during which disconnects are not reported.
    pub fn ignore_inavailability_after_start(&self) -> u32 {
        self.ignore_inavailability_after_start
    }

    pub fn set_ignore_inavailability_after_start(&mut self, seconds: u32) {
        self.ignore_inavailability_after_start = seconds;
    }

    pub fn process(&self) -> Option<&ProcessHandle> {
        self.process.as_ref()
    }

    /// Binds the supervised process consulted for disconnect relevance.
    pub fn set_process(&mut self, process: Option<ProcessHandle>) {
        self.process = process;
    }

    pub fn service(&self) -> Option<&Arc<dyn ActivitySource>> {
        self.service.as_ref()
    }

    /// Binds a host service manager consulted for disconnect relevance.
    pub fn set_service(&mut self, service: Option<Arc<dyn ActivitySource>>) {
        self.service = service;
    }

    /// Records that the host resumed from standby at `at`.
    ///
    /// A running daemon is treated as freshly started for the grace window.
    pub fn handle_wake_up(&mut self, at: DateTime<Utc>) {
        tracing::debug!(connection = %self.connection, woke_up_at = %at, "host resumed from standby");
        self.last_wake_up = Some(at);
    }

    pub fn last_wake_up(&self) -> Option<DateTime<Utc>> {
        self.last_wake_up
    }

    /// Last status seen, `None` before the first status event.
    pub fn previous_status(&self) -> Option<ConnectionStatus> {
        self.previous_status
    }

    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StatusChanged { status } => self.handle_status_changed(status),
            ConnectionEvent::NewDevice {
                when,
                device_id,
                address,
            } => self.handle_new_device(when, device_id, &address),
            ConnectionEvent::NewDirectory {
                when,
                device_id,
                device,
                dir_id,
                dir_label,
            } => self.handle_new_dir(when, device_id, device.as_ref(), dir_id, &dir_label),
            ConnectionEvent::DirectoryCompleted {
                when,
                directory,
                index,
                remote_device,
            } => self.handle_dir_completed(when, &directory, index, remote_device.as_ref()),
        }
    }

    pub fn handle_status_changed(&mut self, new_status: ConnectionStatus) {
        let previous = self.previous_status;
        match previous {
            Some(previous) if self.initialized => {
                self.emit_connected_and_disconnected(previous, new_status);
            }
            _ => {
                tracing::debug!(
                    connection = %self.connection,
                    status = %new_status,
                    "first status event; no transition to report",
                );
            }
        }
        self.initialized = true;
        self.previous_status = Some(new_status);
        self.emit(Notification::StatusChanged {
            previous,
            current: new_status,
        });
    }

    pub fn handle_new_device(&mut self, when: DateTime<Utc>, device_id: DeviceId, address: &str) {
        if !self.enabled(NotificationKind::NEW_DEVICE) {
            return;
        }
        let message = message::new_device(when, &device_id, address);
        self.emit(Notification::NewDevice { device_id, message });
    }

    pub fn handle_new_dir(
        &mut self,
        when: DateTime<Utc>,
        device_id: DeviceId,
        device: Option<&DeviceRef>,
        dir_id: DirId,
        dir_label: &str,
    ) {
        if !self.enabled(NotificationKind::NEW_DIR) {
            return;
        }
        let message = message::new_dir(when, &device_id, device, &dir_id, dir_label);
        self.emit(Notification::NewDir {
            device_id,
            dir_id,
            message,
        });
    }

    /// `remote_device == None` reports local completion, otherwise completion
    /// on that remote device.
    pub fn handle_dir_completed(
        &mut self,
        when: DateTime<Utc>,
        directory: &DirectoryRef,
        index: usize,
        remote_device: Option<&DeviceRef>,
    ) {
        let message = match remote_device {
            None if self.enabled(NotificationKind::LOCAL_SYNC_COMPLETE) => {
                message::local_sync_complete(directory)
            }
            Some(device) if self.enabled(NotificationKind::REMOTE_SYNC_COMPLETE) => {
                message::remote_sync_complete(directory, device)
            }
            _ => return,
        };
        tracing::debug!(
            connection = %self.connection,
            dir = %directory.id,
            index,
            completed_at = %when,
            remote = remote_device.is_some(),
            "directory completed",
        );
        self.emit(Notification::SyncComplete { message });
    }

    /// Whether a disconnect right now is worth telling the user about.
    ///
    /// Not relevant while a bound process/service was stopped by us, or while
    /// it is running but has not been up (since start or the last wake-up) for
    /// longer than a non-zero grace window. Relevant in every other case,
    /// including a crashed daemon and nothing bound at all.
    pub fn is_disconnect_relevant(&self) -> bool {
        let now = self.clock.now();
        let grace = self.ignore_inavailability_after_start;
        let mut sources: Vec<&dyn ActivitySource> = Vec::with_capacity(2);
        if let Some(process) = &self.process {
            sources.push(process);
        }
        if let Some(service) = &self.service {
            sources.push(service.as_ref());
        }
        for source in sources {
            if source.is_manually_stopped() {
                tracing::debug!(connection = %self.connection, "disconnect after manual stop");
                return false;
            }
            if grace > 0 && source.is_running() && self.within_grace(source, grace, now) {
                tracing::debug!(
                    connection = %self.connection,
                    grace_secs = grace,
                    "disconnect within grace window",
                );
                return false;
            }
        }
        true
    }

    fn within_grace(&self, source: &dyn ActivitySource, grace: u32, now: DateTime<Utc>) -> bool {
        if !source.is_active_for(grace, now) {
            return true;
        }
        self.last_wake_up
            .is_some_and(|woke| now - woke <= Duration::seconds(i64::from(grace)))
    }

    fn emit_connected_and_disconnected(
        &self,
        previous: ConnectionStatus,
        new_status: ConnectionStatus,
    ) {
        if previous.is_connected() == new_status.is_connected() {
            return;
        }
        if !self.enabled(NotificationKind::CONNECTED_DISCONNECTED) {
            return;
        }
        if new_status.is_connected() {
            self.emit(Notification::Connected);
        } else if self.is_disconnect_relevant() {
            self.emit(Notification::Disconnected);
        } else {
            tracing::info!(
                connection = %self.connection,
                status = %new_status,
                "suppressed disconnect notification",
            );
        }
    }

    fn enabled(&self, kind: NotificationKind) -> bool {
        self.enabled_notifications.contains(kind)
    }

    fn emit(&self, notification: Notification) {
        // No subscribers is not an error; the signal is simply unobserved.
        let _ = self.tx.send(notification);
    }
}
