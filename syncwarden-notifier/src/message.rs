//! Message texts for the high-level notifications.
//!
//! Missing names and labels never fail formatting; raw identifiers are used
//! instead.

use chrono::{DateTime, Utc};
use syncwarden_core::{DeviceId, DeviceRef, DirId, DirectoryRef};

fn timestamp(when: DateTime<Utc>) -> String {
    when.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `"Photos" (abcd-1234)` when labelled, the bare id otherwise.
fn dir_name(dir_id: &DirId, dir_label: &str) -> String {
    let label = dir_label.trim();
    if label.is_empty() {
        dir_id.0.clone()
    } else {
        format!("\"{label}\" ({dir_id})")
    }
}

pub fn new_device(when: DateTime<Utc>, device_id: &DeviceId, address: &str) -> String {
    format!(
        "{}: unknown device {device_id} ({address}) wants to connect",
        timestamp(when)
    )
}

pub fn new_dir(
    when: DateTime<Utc>,
    device_id: &DeviceId,
    device: Option<&DeviceRef>,
    dir_id: &DirId,
    dir_label: &str,
) -> String {
    let device_name = device.map(DeviceRef::display_name).unwrap_or(device_id.0.as_str());
    format!(
        "{}: device {device_name} wants to share directory {}",
        timestamp(when),
        dir_name(dir_id, dir_label)
    )
}

pub fn local_sync_complete(directory: &DirectoryRef) -> String {
    format!(
        "Synchronization of local directory {} complete",
        dir_name(&directory.id, &directory.label)
    )
}

pub fn remote_sync_complete(directory: &DirectoryRef, remote_device: &DeviceRef) -> String {
    format!(
        "{} has completed synchronizing directory {}",
        remote_device.display_name(),
        dir_name(&directory.id, &directory.label)
    )
}
