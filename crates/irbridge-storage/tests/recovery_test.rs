//! Crash-recovery tests for the device store.
//!
//! Exercises backup fallback and atomic-replace behavior against a real
//! temp directory.

use std::fs;

use irbridge_core::types::{CommandRecord, EntityKind};
use irbridge_storage::DeviceStore;

#[tokio::test]
async fn recovers_all_devices_from_backup_after_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");

    {
        let store = DeviceStore::open(&path);
        for name in ["Fan One", "Fan Two", "Fan Three", "Fan Four", "Fan Five"] {
            store.create(name, EntityKind::Fan, None).await.unwrap();
        }
    }

    // Simulate a crash mid-write: the primary ends up truncated.
    let raw = fs::read(&path).unwrap();
    fs::write(&path, &raw[..raw.len() / 2]).unwrap();

    let store = DeviceStore::open(&path);
    let report = store.recovery_report().await;
    assert!(report.recovered_from_backup);
    assert!(!report.started_empty_after_corruption);

    let devices = store.list().await;
    assert_eq!(devices.len(), 5);
}

#[tokio::test]
async fn starts_empty_when_backup_is_also_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");

    fs::write(&path, b"garbage").unwrap();
    fs::write(dir.path().join("devices.json.bak"), b"also garbage").unwrap();

    let store = DeviceStore::open(&path);
    assert!(store.recovery_report().await.started_empty_after_corruption);
    assert!(store.list().await.is_empty());
}

#[tokio::test]
async fn backup_always_holds_previous_valid_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");

    let store = DeviceStore::open(&path);
    store.create("TV", EntityKind::MediaPlayer, None).await.unwrap();
    store
        .put_command("tv", CommandRecord::ir("turn_on", "JgBG"))
        .await
        .unwrap();

    // The backup lags the primary by exactly one mutation.
    let backup = fs::read_to_string(dir.path().join("devices.json.bak")).unwrap();
    assert!(backup.contains("\"tv\""));
    assert!(!backup.contains("turn_on"));

    let primary = fs::read_to_string(&path).unwrap();
    assert!(primary.contains("turn_on"));
}

#[tokio::test]
async fn reload_picks_up_external_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");

    let store = DeviceStore::open(&path);
    store.create("TV", EntityKind::MediaPlayer, None).await.unwrap();

    // Second handle mutates the same file; first sees it after reload.
    let other = DeviceStore::open(&path);
    other.create("Bedroom Fan", EntityKind::Fan, None).await.unwrap();

    assert_eq!(store.list().await.len(), 1);
    store.reload().await;
    assert_eq!(store.list().await.len(), 2);
}
