//! The device store.
//!
//! Single source of truth for device and command records. All writes
//! funnel through one async writer lock per store instance, so they are
//! linearized; readers get cloned snapshots and never observe a
//! partially applied mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use irbridge_core::slug::normalize;
use irbridge_core::types::{CommandRecord, DevicePatch, DeviceRecord, EntityKind};

use crate::error::{Error, Result};
use crate::file::{self, OpenOutcome, StoreData};

/// Recovery signal from the last open or reload.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// True when the primary file was corrupt and state came from the
    /// rolling backup.
    pub recovered_from_backup: bool,
    /// True when neither primary nor backup was usable and the store
    /// initialized empty despite a file being present on disk.
    pub started_empty_after_corruption: bool,
}

/// Durable mapping from device id to device record and its command set.
pub struct DeviceStore {
    path: PathBuf,
    inner: Arc<RwLock<StoreData>>,
    recovery: Arc<RwLock<RecoveryReport>>,
}

impl DeviceStore {
    /// Open (or create) a store backed by `path`.
    ///
    /// A corrupt primary is recovered from the backup; with no valid
    /// backup the store starts empty rather than refusing to open. The
    /// outcome is queryable via [`DeviceStore::recovery_report`].
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let (data, outcome) = file::load_or_recover(&path);
        let report = Self::report_for(outcome);
        if report.recovered_from_backup {
            info!(path = %path.display(), "store recovered from backup");
        }
        Self {
            path,
            inner: Arc::new(RwLock::new(data)),
            recovery: Arc::new(RwLock::new(report)),
        }
    }

    fn report_for(outcome: OpenOutcome) -> RecoveryReport {
        RecoveryReport {
            recovered_from_backup: outcome == OpenOutcome::RecoveredFromBackup,
            started_empty_after_corruption: outcome == OpenOutcome::StartedEmpty,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recovery signal from the most recent open/reload.
    pub async fn recovery_report(&self) -> RecoveryReport {
        self.recovery.read().await.clone()
    }

    /// Re-read state from disk, replacing the in-memory snapshot.
    ///
    /// Invoked after an external-change notification; local mutations
    /// keep memory and disk in step on their own.
    pub async fn reload(&self) {
        let (data, outcome) = file::load_or_recover(&self.path);
        let mut inner = self.inner.write().await;
        *inner = data;
        *self.recovery.write().await = Self::report_for(outcome);
    }

    /// Run one mutation under the writer lock: apply to a copy, persist
    /// it, and only then publish it to readers. A failed persist leaves
    /// both the file and the in-memory state untouched.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut StoreData) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.write().await;
        let mut next = inner.clone();
        let out = op(&mut next)?;
        file::write_atomic(&self.path, &next)?;
        *inner = next;
        Ok(out)
    }

    /// Create a device. The display name is normalized into the
    /// immutable id; collisions fail with [`Error::DuplicateId`].
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        display_name: &str,
        entity_kind: EntityKind,
        hub_reference: Option<String>,
    ) -> Result<DeviceRecord> {
        let id = normalize(display_name).map_err(|_| Error::InvalidName(display_name.into()))?;
        self.mutate(|data| {
            if data.devices.contains_key(&id) {
                return Err(Error::DuplicateId(id.clone()));
            }
            let mut device = DeviceRecord::new(id.clone(), display_name, entity_kind);
            device.hub_reference = hub_reference;
            data.devices.insert(id.clone(), device.clone());
            info!(device_id = %id, kind = %entity_kind, "device created");
            Ok(device)
        })
        .await
    }

    /// Fetch one device by id.
    pub async fn get(&self, id: &str) -> Result<DeviceRecord> {
        self.inner
            .read()
            .await
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("device {id}")))
    }

    /// Snapshot of all devices, ordered by id.
    pub async fn list(&self) -> Vec<DeviceRecord> {
        self.inner.read().await.devices.values().cloned().collect()
    }

    /// Apply a patch to an existing device.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: DevicePatch) -> Result<DeviceRecord> {
        self.mutate(|data| {
            let device = data
                .devices
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("device {id}")))?;
            patch.apply(device);
            Ok(device.clone())
        })
        .await
    }

    /// Delete a device and all of its commands.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<DeviceRecord> {
        self.mutate(|data| {
            data.devices
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("device {id}")))
        })
        .await
    }

    /// Insert or replace one command on a device. Re-learning an
    /// existing name is a full replace, never an in-place edit.
    #[instrument(skip(self, command), fields(command_name = %command.name))]
    pub async fn put_command(&self, device_id: &str, command: CommandRecord) -> Result<CommandRecord> {
        self.mutate(|data| {
            let device = data
                .devices
                .get_mut(device_id)
                .ok_or_else(|| Error::NotFound(format!("device {device_id}")))?;
            if device.commands.contains_key(&command.name) {
                warn!(device_id, command_name = %command.name, "replacing existing command");
            }
            device.updated_at = Utc::now();
            device.commands.insert(command.name.clone(), command.clone());
            Ok(command)
        })
        .await
    }

    /// Remove one command from a device.
    #[instrument(skip(self))]
    pub async fn delete_command(&self, device_id: &str, name: &str) -> Result<CommandRecord> {
        self.mutate(|data| {
            let device = data
                .devices
                .get_mut(device_id)
                .ok_or_else(|| Error::NotFound(format!("device {device_id}")))?;
            let removed = device
                .commands
                .remove(name)
                .ok_or_else(|| Error::NotFound(format!("command {device_id}/{name}")))?;
            device.updated_at = Utc::now();
            Ok(removed)
        })
        .await
    }

    /// Command records for one device, ordered by name.
    pub async fn list_commands(&self, device_id: &str) -> Result<Vec<CommandRecord>> {
        let device = self.get(device_id).await?;
        Ok(device.commands.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, DeviceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceStore::open(dir.path().join("devices.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_normalizes_and_rejects_duplicates() {
        let (_dir, store) = temp_store();

        let dev = store
            .create("Tony's Office Light", EntityKind::Light, None)
            .await
            .unwrap();
        assert_eq!(dev.id, "tonys_office_light");

        // Different raw spelling, same normalized id.
        let err = store
            .create("tonys office light", EntityKind::Light, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "tonys_office_light"));
    }

    #[tokio::test]
    async fn test_update_does_not_change_id() {
        let (_dir, store) = temp_store();
        store.create("Bedroom Fan", EntityKind::Fan, None).await.unwrap();

        let patch = DevicePatch {
            display_name: Some("Master Bedroom Fan".into()),
            ..Default::default()
        };
        let updated = store.update("bedroom_fan", patch).await.unwrap();
        assert_eq!(updated.id, "bedroom_fan");
        assert_eq!(updated.display_name, "Master Bedroom Fan");
    }

    #[tokio::test]
    async fn test_put_and_delete_command() {
        let (_dir, store) = temp_store();
        store.create("TV", EntityKind::MediaPlayer, None).await.unwrap();

        store
            .put_command("tv", CommandRecord::ir("turn_on", "JgBG"))
            .await
            .unwrap();
        assert_eq!(store.list_commands("tv").await.unwrap().len(), 1);

        store.delete_command("tv", "turn_on").await.unwrap();
        assert!(store.list_commands("tv").await.unwrap().is_empty());

        let err = store.delete_command("tv", "turn_on").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_state_untouched() {
        let (_dir, store) = temp_store();
        store.create("TV", EntityKind::MediaPlayer, None).await.unwrap();

        let err = store
            .put_command("missing", CommandRecord::ir("turn_on", "JgBG"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        {
            let store = DeviceStore::open(&path);
            store.create("Bedroom Fan", EntityKind::Fan, Some("rm4".into())).await.unwrap();
            store
                .put_command("bedroom_fan", CommandRecord::rf("turn_on", "sgcc", 433.92))
                .await
                .unwrap();
        }

        let store = DeviceStore::open(&path);
        let dev = store.get("bedroom_fan").await.unwrap();
        assert_eq!(dev.hub_reference.as_deref(), Some("rm4"));
        assert_eq!(dev.commands["turn_on"].frequency, Some(433.92));
        assert!(!store.recovery_report().await.recovered_from_backup);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_different_devices() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        store.create("Fan A", EntityKind::Fan, None).await.unwrap();
        store.create("Fan B", EntityKind::Fan, None).await.unwrap();

        let mut handles = Vec::new();
        for (dev, n) in [("fan_a", 0), ("fan_b", 1)] {
            for i in 0..5 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    let cmd = CommandRecord::ir(format!("cmd_{n}_{i}"), "JgBG");
                    store.put_command(dev, cmd).await.unwrap();
                }));
            }
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.list_commands("fan_a").await.unwrap().len(), 5);
        assert_eq!(store.list_commands("fan_b").await.unwrap().len(), 5);
    }
}
