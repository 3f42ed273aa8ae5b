use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const EVENTS: &str = r#"{"event":"status-changed","status":"disconnected"}
{"event":"status-changed","status":"synchronizing"}
{"event":"new-device","when":"2024-03-01T12:00:00Z","device_id":"ABC","address":"10.0.0.5"}
not json at all
{"event":"new-directory","when":"2024-03-01T12:01:00Z","device_id":"ABC","device":{"id":"ABC","name":"laptop"},"dir_id":"photos","dir_label":"Photos"}
{"event":"status-changed","status":"reconnecting"}
"#;

fn syncwarden_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("syncwarden"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

fn write_events(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("events.jsonl");
    fs::write(&path, EVENTS).expect("write events");
    path
}

#[test]
fn replay_uses_configured_defaults() {
    let home = TempDir::new().expect("home");
    let events = write_events(&home);

    syncwarden_cmd(home.path())
        .arg("replay")
        .arg(&events)
        .assert()
        .success()
        .stdout(contains("connected to daemon"))
        .stdout(contains("unknown device ABC (10.0.0.5) wants to connect"))
        .stdout(contains("device laptop wants to share directory \"Photos\" (photos)"))
        .stdout(contains("disconnected from daemon"))
        .stderr(contains("5 events"));
}

#[test]
fn notify_flag_narrows_output() {
    let home = TempDir::new().expect("home");
    let events = write_events(&home);

    syncwarden_cmd(home.path())
        .arg("replay")
        .arg(&events)
        .args(["--notify", "new-device"])
        .assert()
        .success()
        .stdout(contains("unknown device ABC"))
        .stdout(contains("connected to daemon").not())
        .stdout(contains("wants to share directory").not());
}

#[test]
fn json_output_from_stdin() {
    let home = TempDir::new().expect("home");

    let output = assert_cmd::Command::from_std(syncwarden_cmd(home.path()))
        .args(["replay", "-", "--json", "--notify", "none"])
        .write_stdin(EVENTS)
        .output()
        .expect("run");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let tags: Vec<String> = stdout
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).expect("json line");
            v["notification"].as_str().expect("tag").to_string()
        })
        .collect();
    assert_eq!(tags, vec!["status-changed"; 3]);
}

#[test]
fn unknown_notify_kind_is_rejected() {
    let home = TempDir::new().expect("home");
    syncwarden_cmd(home.path())
        .args(["replay", "-", "--notify", "everything"])
        .assert()
        .failure()
        .stderr(contains("everything"));
}

#[test]
fn missing_file_fails() {
    let home = TempDir::new().expect("home");
    syncwarden_cmd(home.path())
        .args(["replay", "/nonexistent/events.jsonl"])
        .assert()
        .failure()
        .stderr(contains("failed to replay"));
}
