//! End-to-end behaviour of the aggregator over realistic event sequences.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rstest::rstest;
use tokio::sync::{broadcast, watch};

use syncwarden_core::{
    ActivitySource, Clock, ConnectionEvent, ConnectionStatus, DeviceId, DeviceRef, DirId,
    DirectoryRef, ManualClock, ProcessHandle, ProcessSnapshot, ProcessState,
};
use syncwarden_notifier::{Notification, NotificationKind, SyncthingNotifier};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

fn high_level(notifications: &[Notification]) -> Vec<Notification> {
    notifications
        .iter()
        .filter(|n| n.is_high_level())
        .cloned()
        .collect()
}

fn running_since(since: DateTime<Utc>) -> ProcessSnapshot {
    ProcessSnapshot {
        state: ProcessState::Running,
        active_since: Some(since),
        manually_stopped: false,
        pid: Some(4242),
    }
}

struct Fixture {
    clock: Arc<ManualClock>,
    notifier: SyncthingNotifier,
    rx: broadcast::Receiver<Notification>,
}

fn fixture(mask: NotificationKind) -> Fixture {
    let clock = Arc::new(ManualClock::new(start()));
    let mut notifier = SyncthingNotifier::with_clock("local", clock.clone());
    notifier.set_enabled_notifications(mask);
    let rx = notifier.subscribe();
    Fixture {
        clock,
        notifier,
        rx,
    }
}

/// A host-service provider as an external integration would implement it.
struct FakeService {
    since: Option<DateTime<Utc>>,
    manually_stopped: bool,
}

impl ActivitySource for FakeService {
    fn is_running(&self) -> bool {
        self.since.is_some()
    }

    fn active_since(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    fn is_manually_stopped(&self) -> bool {
        self.manually_stopped
    }
}

// ---------------------------------------------------------------------------
// 1. Connected / disconnected gating
// ---------------------------------------------------------------------------

#[test]
fn first_event_never_reports_a_transition() {
    for status in [ConnectionStatus::Disconnected, ConnectionStatus::Synchronizing] {
        let mut f = fixture(NotificationKind::ALL);
        f.notifier.handle_status_changed(status);
        assert_eq!(
            drain(&mut f.rx),
            vec![Notification::StatusChanged {
                previous: None,
                current: status
            }]
        );
    }
}

#[test]
fn connect_disconnect_cycle_without_supervisor() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.notifier.handle_status_changed(ConnectionStatus::Synchronizing);
    f.notifier.handle_status_changed(ConnectionStatus::Reconnecting);

    let all = drain(&mut f.rx);
    assert_eq!(
        high_level(&all),
        vec![Notification::Connected, Notification::Disconnected]
    );
    assert_eq!(all.len(), 6, "four status changes plus two transitions");
    assert!(all.contains(&Notification::StatusChanged {
        previous: Some(ConnectionStatus::Idle),
        current: ConnectionStatus::Synchronizing,
    }));
}

#[rstest]
// mask enabled, supervisor bound, manually stopped, seconds since start, expect disconnected
#[case(true, false, false, 0, true)]
#[case(false, false, false, 0, false)]
#[case(true, true, false, 100, true)]
#[case(true, true, false, 5, false)]
#[case(true, true, true, 100, false)]
#[case(false, true, false, 100, false)]
fn disconnected_gating(
    #[case] enabled: bool,
    #[case] bound: bool,
    #[case] manually_stopped: bool,
    #[case] seconds_since_start: i64,
    #[case] expect_disconnected: bool,
) {
    let mask = if enabled {
        NotificationKind::CONNECTED_DISCONNECTED
    } else {
        NotificationKind::NONE
    };
    let mut f = fixture(mask);
    f.notifier.set_ignore_inavailability_after_start(30);

    let (_tx, rx) = watch::channel(ProcessSnapshot {
        manually_stopped,
        ..running_since(start())
    });
    if bound {
        f.notifier.set_process(Some(ProcessHandle::new(rx)));
    }

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.clock.advance(Duration::seconds(seconds_since_start));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);

    let got = drain(&mut f.rx).contains(&Notification::Disconnected);
    assert_eq!(got, expect_disconnected);
}

#[test]
fn disconnect_after_process_crashed_is_reported() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_ignore_inavailability_after_start(30);
    let (tx, rx) = watch::channel(running_since(start() - Duration::hours(1)));
    f.notifier.set_process(Some(ProcessHandle::new(rx)));

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    // Crash: the supervisor clears active_since without a stop request.
    tx.send_replace(ProcessSnapshot::default());
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);

    assert_eq!(high_level(&drain(&mut f.rx)), vec![Notification::Disconnected]);
}

#[rstest]
#[case(0, true)]
#[case(30, false)]
fn disconnect_while_process_starting(#[case] grace: u32, #[case] expect_disconnected: bool) {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_ignore_inavailability_after_start(grace);
    let (_tx, rx) = watch::channel(ProcessSnapshot {
        state: ProcessState::Starting,
        ..ProcessSnapshot::default()
    });
    f.notifier.set_process(Some(ProcessHandle::new(rx)));

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);

    let got = drain(&mut f.rx).contains(&Notification::Disconnected);
    assert_eq!(got, expect_disconnected);
}

#[test]
fn disconnect_right_after_standby_wake_up_is_suppressed() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_ignore_inavailability_after_start(30);
    let (_tx, rx) = watch::channel(running_since(start() - Duration::hours(8)));
    f.notifier.set_process(Some(ProcessHandle::new(rx)));

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.notifier.handle_wake_up(f.clock.now());
    f.clock.advance(Duration::seconds(3));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert!(high_level(&drain(&mut f.rx)).is_empty(), "within 30 s of wake-up");

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.clock.advance(Duration::seconds(40));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert_eq!(
        high_level(&drain(&mut f.rx)),
        vec![Notification::Connected, Notification::Disconnected]
    );
}

#[test]
fn stop_then_disconnect_within_grace_window_is_suppressed() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_ignore_inavailability_after_start(30);
    let (tx, rx) = watch::channel(running_since(start() - Duration::minutes(10)));
    f.notifier.set_process(Some(ProcessHandle::new(rx)));

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    // stop_syncthing() flips the flag while the process is still alive.
    tx.send_modify(|s| {
        s.state = ProcessState::StoppingGraceful;
        s.manually_stopped = true;
    });
    f.clock.advance(Duration::seconds(2));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);

    let all = drain(&mut f.rx);
    assert!(!all.contains(&Notification::Disconnected));
    assert!(all.contains(&Notification::StatusChanged {
        previous: Some(ConnectionStatus::Idle),
        current: ConnectionStatus::Disconnected,
    }));
}

#[test]
fn service_source_is_consulted_like_a_process() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_ignore_inavailability_after_start(30);
    f.notifier.set_service(Some(Arc::new(FakeService {
        since: Some(start()),
        manually_stopped: false,
    })));

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.clock.advance(Duration::seconds(10));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert!(high_level(&drain(&mut f.rx)).is_empty(), "service just started");

    f.notifier.set_service(Some(Arc::new(FakeService {
        since: Some(start()),
        manually_stopped: false,
    })));
    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.clock.advance(Duration::seconds(60));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert_eq!(
        high_level(&drain(&mut f.rx)),
        vec![Notification::Connected, Notification::Disconnected]
    );
}

#[test]
fn manually_stopped_service_suppresses_disconnect() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_service(Some(Arc::new(FakeService {
        since: None,
        manually_stopped: true,
    })));
    f.notifier.handle_status_changed(ConnectionStatus::Paused);
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert!(high_level(&drain(&mut f.rx)).is_empty());
}

#[test]
fn service_that_is_not_running_does_not_suppress() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED);
    f.notifier.set_ignore_inavailability_after_start(30);
    f.notifier.set_service(Some(Arc::new(FakeService {
        since: None,
        manually_stopped: false,
    })));
    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert_eq!(high_level(&drain(&mut f.rx)), vec![Notification::Disconnected]);
}

// ---------------------------------------------------------------------------
// 2. Mask changes
// ---------------------------------------------------------------------------

#[test]
fn mask_none_silences_everything_but_status_changes() {
    let mut f = fixture(NotificationKind::ALL);
    f.notifier.set_enabled_notifications(NotificationKind::NONE);

    let events = vec![
        ConnectionEvent::StatusChanged {
            status: ConnectionStatus::Disconnected,
        },
        ConnectionEvent::StatusChanged {
            status: ConnectionStatus::Idle,
        },
        ConnectionEvent::NewDevice {
            when: start(),
            device_id: DeviceId::from("ABC"),
            address: "10.0.0.5".to_string(),
        },
        ConnectionEvent::NewDirectory {
            when: start(),
            device_id: DeviceId::from("ABC"),
            device: None,
            dir_id: DirId::from("photos"),
            dir_label: "Photos".to_string(),
        },
        ConnectionEvent::DirectoryCompleted {
            when: start(),
            directory: DirectoryRef::new("photos", "Photos"),
            index: 0,
            remote_device: None,
        },
        ConnectionEvent::StatusChanged {
            status: ConnectionStatus::Disconnected,
        },
    ];
    for event in events {
        f.notifier.handle_event(event);
    }

    let all = drain(&mut f.rx);
    assert!(high_level(&all).is_empty());
    assert_eq!(all.len(), 3, "every status change is still reported");
}

#[test]
fn mask_change_applies_to_next_event_only() {
    let mut f = fixture(NotificationKind::NONE);
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    assert!(high_level(&drain(&mut f.rx)).is_empty());

    f.notifier
        .set_enabled_notifications(NotificationKind::CONNECTED_DISCONNECTED);
    assert!(drain(&mut f.rx).is_empty(), "changing the mask emits nothing");

    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);
    assert_eq!(high_level(&drain(&mut f.rx)), vec![Notification::Disconnected]);
}

// ---------------------------------------------------------------------------
// 3. Devices, directories, completion
// ---------------------------------------------------------------------------

#[test]
fn grace_window_scenario_with_new_device() {
    let mut f = fixture(NotificationKind::CONNECTED_DISCONNECTED | NotificationKind::NEW_DEVICE);
    f.notifier.set_ignore_inavailability_after_start(30);
    let (_tx, rx) = watch::channel(running_since(f.clock.now()));
    f.notifier.set_process(Some(ProcessHandle::new(rx)));

    f.notifier.handle_status_changed(ConnectionStatus::Idle);
    f.clock.advance(Duration::seconds(5));
    f.notifier.handle_status_changed(ConnectionStatus::Disconnected);

    let all = drain(&mut f.rx);
    assert!(!all.contains(&Notification::Disconnected));
    assert!(all.contains(&Notification::StatusChanged {
        previous: Some(ConnectionStatus::Idle),
        current: ConnectionStatus::Disconnected,
    }));

    f.notifier
        .handle_new_device(f.clock.now(), DeviceId::from("ABC"), "10.0.0.5");
    match drain(&mut f.rx).as_slice() {
        [Notification::NewDevice { device_id, message }] => {
            assert_eq!(device_id, &DeviceId::from("ABC"));
            assert!(message.contains("ABC"), "got: {message}");
            assert!(message.contains("10.0.0.5"), "got: {message}");
        }
        other => panic!("unexpected notifications: {other:?}"),
    }
}

#[test]
fn new_device_is_reported_every_time_upstream_says_so() {
    let mut f = fixture(NotificationKind::NEW_DEVICE);
    for _ in 0..2 {
        f.notifier
            .handle_new_device(start(), DeviceId::from("ABC"), "10.0.0.5");
    }
    assert_eq!(drain(&mut f.rx).len(), 2);
}

#[test]
fn new_dir_uses_device_name_or_raw_id() {
    let mut f = fixture(NotificationKind::NEW_DIR);
    let known = DeviceRef::new("ABC", Some("laptop".to_string()));
    f.notifier.handle_new_dir(
        start(),
        DeviceId::from("ABC"),
        Some(&known),
        DirId::from("photos"),
        "Photos",
    );
    f.notifier
        .handle_new_dir(start(), DeviceId::from("XYZ"), None, DirId::from("music"), "");

    match drain(&mut f.rx).as_slice() {
        [Notification::NewDir {
            device_id: first_dev,
            dir_id: first_dir,
            message: first,
        }, Notification::NewDir {
            message: second, ..
        }] => {
            assert_eq!(first_dev, &DeviceId::from("ABC"));
            assert_eq!(first_dir, &DirId::from("photos"));
            assert!(first.contains("laptop") && first.contains("Photos"), "got: {first}");
            assert!(second.contains("XYZ") && second.contains("music"), "got: {second}");
        }
        other => panic!("unexpected notifications: {other:?}"),
    }
}

#[rstest]
#[case(NotificationKind::LOCAL_SYNC_COMPLETE, false, true)]
#[case(NotificationKind::LOCAL_SYNC_COMPLETE, true, false)]
#[case(NotificationKind::REMOTE_SYNC_COMPLETE, true, true)]
#[case(NotificationKind::REMOTE_SYNC_COMPLETE, false, false)]
fn sync_complete_is_gated_by_origin(
    #[case] mask: NotificationKind,
    #[case] remote: bool,
    #[case] expect: bool,
) {
    let mut f = fixture(mask);
    let dir = DirectoryRef::new("docs", "Documents");
    let device = DeviceRef::new("XYZ", Some("nas".to_string()));
    f.notifier
        .handle_dir_completed(start(), &dir, 3, remote.then_some(&device));

    let all = drain(&mut f.rx);
    assert_eq!(all.len(), usize::from(expect));
    if let Some(Notification::SyncComplete { message }) = all.first() {
        assert!(message.contains("Documents"));
        assert_eq!(message.contains("nas"), remote);
    }
}
