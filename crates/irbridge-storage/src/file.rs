//! On-disk representation and the atomic write/recover protocol.
//!
//! The persisted shape is a small versioned wrapper around the device
//! map, kept pretty-printed so the file stays human-inspectable for
//! manual recovery.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use irbridge_core::config::paths;
use irbridge_core::types::{DeviceId, DeviceRecord};

use crate::error::Result;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Whole-file persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreData {
    pub version: u32,
    #[serde(default)]
    pub devices: BTreeMap<DeviceId, DeviceRecord>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            devices: BTreeMap::new(),
        }
    }
}

/// How the last open obtained its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Primary file parsed cleanly (or did not exist yet).
    Primary,
    /// Primary was corrupt; state came from the rolling backup.
    RecoveredFromBackup,
    /// Primary and backup both unusable; started empty.
    StartedEmpty,
}

/// Backup path for a primary store file.
pub fn backup_path(primary: &Path) -> PathBuf {
    let mut os = primary.as_os_str().to_owned();
    os.push(paths::BACKUP_SUFFIX);
    PathBuf::from(os)
}

fn tmp_path(primary: &Path) -> PathBuf {
    let mut os = primary.as_os_str().to_owned();
    os.push(paths::TMP_SUFFIX);
    PathBuf::from(os)
}

fn parse(path: &Path) -> Option<StoreData> {
    let raw = fs::read(path).ok()?;
    match serde_json::from_slice::<StoreData>(&raw) {
        Ok(data) if data.version == FORMAT_VERSION => Some(data),
        Ok(data) => {
            warn!(path = %path.display(), version = data.version, "unsupported store format version");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store file failed to parse");
            None
        }
    }
}

/// Load the store, falling back to the backup when the primary is
/// corrupt and to an empty state when both are unusable. Never fails
/// the caller over corruption; missing files mean a fresh store.
pub fn load_or_recover(primary: &Path) -> (StoreData, OpenOutcome) {
    if !primary.exists() {
        debug!(path = %primary.display(), "no store file, starting empty");
        return (StoreData::default(), OpenOutcome::Primary);
    }
    if let Some(data) = parse(primary) {
        return (data, OpenOutcome::Primary);
    }

    let backup = backup_path(primary);
    if let Some(data) = parse(&backup) {
        warn!(
            path = %primary.display(),
            backup = %backup.display(),
            devices = data.devices.len(),
            "primary store corrupt, recovered from backup"
        );
        return (data, OpenOutcome::RecoveredFromBackup);
    }

    warn!(path = %primary.display(), "primary and backup unusable, starting empty");
    (StoreData::default(), OpenOutcome::StartedEmpty)
}

/// Atomically replace the primary file with `data`.
///
/// Protocol: serialize to `<file>.tmp`, fsync, copy the current primary
/// to `<file>.bak`, then rename the temp file over the primary. Any
/// failure before the rename leaves the primary untouched.
pub fn write_atomic(primary: &Path, data: &StoreData) -> Result<()> {
    if let Some(parent) = primary.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = tmp_path(primary);
    {
        let mut f = fs::File::create(&tmp)?;
        let buf = serde_json::to_vec_pretty(data)?;
        f.write_all(&buf)?;
        f.sync_all()?;
    }

    // Backup strictly before the primary is replaced.
    if primary.exists() {
        fs::copy(primary, backup_path(primary))?;
    }

    fs::rename(&tmp, primary)?;
    debug!(path = %primary.display(), devices = data.devices.len(), "store written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use irbridge_core::types::{DeviceRecord, EntityKind};

    fn sample() -> StoreData {
        let mut data = StoreData::default();
        let dev = DeviceRecord::new("tv", "TV", EntityKind::MediaPlayer);
        data.devices.insert(dev.id.clone(), dev);
        data
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        write_atomic(&path, &sample()).unwrap();
        let (loaded, outcome) = load_or_recover(&path);
        assert_eq!(outcome, OpenOutcome::Primary);
        assert!(loaded.devices.contains_key("tv"));
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (data, outcome) = load_or_recover(&dir.path().join("devices.json"));
        assert_eq!(outcome, OpenOutcome::Primary);
        assert!(data.devices.is_empty());
    }

    #[test]
    fn test_corrupt_primary_falls_back_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        // Two writes so a backup of valid state exists.
        write_atomic(&path, &sample()).unwrap();
        write_atomic(&path, &sample()).unwrap();
        fs::write(&path, b"{ truncated").unwrap();

        let (data, outcome) = load_or_recover(&path);
        assert_eq!(outcome, OpenOutcome::RecoveredFromBackup);
        assert!(data.devices.contains_key("tv"));
    }

    #[test]
    fn test_no_backup_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        fs::write(&path, b"not json").unwrap();

        let (data, outcome) = load_or_recover(&path);
        assert_eq!(outcome, OpenOutcome::StartedEmpty);
        assert!(data.devices.is_empty());
    }
}
