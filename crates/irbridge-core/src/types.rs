//! Device and command data structures.
//!
//! The store owns `DeviceRecord`/`CommandRecord` lifetimes; everything
//! else works on cloned snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device identifier (normalized slug).
pub type DeviceId = String;

/// The automation-platform domain a device is rendered as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Light,
    Fan,
    Switch,
    MediaPlayer,
    Cover,
    Climate,
}

impl EntityKind {
    /// All supported kinds, in stable order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Light,
        EntityKind::Fan,
        EntityKind::Switch,
        EntityKind::MediaPlayer,
        EntityKind::Cover,
        EntityKind::Climate,
    ];

    /// Get the kind name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Light => "light",
            EntityKind::Fan => "fan",
            EntityKind::Switch => "switch",
            EntityKind::MediaPlayer => "media_player",
            EntityKind::Cover => "cover",
            EntityKind::Climate => "climate",
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(EntityKind::Light),
            "fan" => Ok(EntityKind::Fan),
            "switch" => Ok(EntityKind::Switch),
            "media_player" => Ok(EntityKind::MediaPlayer),
            "cover" => Ok(EntityKind::Cover),
            "climate" => Ok(EntityKind::Climate),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a command was captured over infrared or radio frequency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Ir,
    Rf,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Ir => "ir",
            SignalKind::Rf => "rf",
        }
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ir" => Ok(SignalKind::Ir),
            "rf" => Ok(SignalKind::Rf),
            other => Err(format!("unknown signal kind: {other}")),
        }
    }
}

/// One captured signal.
///
/// `code` is an opaque payload passed through from the hub; it is never
/// decoded here. `frequency` is only present for RF commands, produced
/// by the sweep phase of a two-phase RF capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRecord {
    /// Canonical command identifier, e.g. `turn_on` or `speed_2`.
    pub name: String,
    /// Capture transport.
    pub signal_kind: SignalKind,
    /// Opaque captured payload.
    pub code: String,
    /// Locked carrier frequency in MHz (RF only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    /// When the command was learned.
    pub learned_at: DateTime<Utc>,
}

impl CommandRecord {
    /// Create an IR command record.
    pub fn ir(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signal_kind: SignalKind::Ir,
            code: code.into(),
            frequency: None,
            learned_at: Utc::now(),
        }
    }

    /// Create an RF command record with its locked frequency.
    pub fn rf(name: impl Into<String>, code: impl Into<String>, frequency: f64) -> Self {
        Self {
            name: name.into(),
            signal_kind: SignalKind::Rf,
            code: code.into(),
            frequency: Some(frequency),
            learned_at: Utc::now(),
        }
    }
}

/// Identity and classification for one managed appliance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceRecord {
    /// Stable slug, unique across the store, immutable after creation.
    pub id: DeviceId,
    /// User-facing label; editable, does not affect `id`.
    pub display_name: String,
    /// Fixed at creation.
    pub entity_kind: EntityKind,
    /// Identifier of the controlling hub; required for learning, not
    /// for entity generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_reference: Option<String>,
    /// Optional fixture label grouping multiple devices that share one
    /// physical appliance (e.g. a ceiling fan with a light).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Learned commands keyed by canonical name.
    #[serde(default)]
    pub commands: BTreeMap<String, CommandRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Create a new device record. `id` must already be a normalized slug.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: EntityKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            display_name: display_name.into(),
            entity_kind: kind,
            hub_reference: None,
            group: None,
            commands: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the controlling hub reference.
    pub fn with_hub(mut self, hub_reference: impl Into<String>) -> Self {
        self.hub_reference = Some(hub_reference.into());
        self
    }

    /// Set the fixture group label.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Command names in stable order.
    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }
}

/// Editable subset of a device record. `id` and `entity_kind` are
/// immutable; changing the kind would require an explicit migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicePatch {
    pub display_name: Option<String>,
    /// `Some(None)` clears the hub reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_reference: Option<Option<String>>,
    /// `Some(None)` clears the group label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Option<String>>,
}

impl DevicePatch {
    /// Apply the patch in place, bumping `updated_at`.
    pub fn apply(self, device: &mut DeviceRecord) {
        if let Some(name) = self.display_name {
            device.display_name = name;
        }
        if let Some(hub) = self.hub_reference {
            device.hub_reference = hub;
        }
        if let Some(group) = self.group {
            device.group = group;
        }
        device.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in EntityKind::ALL {
            let parsed: EntityKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("thermostat".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_command_record_constructors() {
        let ir = CommandRecord::ir("turn_on", "JgBGAJKV");
        assert_eq!(ir.signal_kind, SignalKind::Ir);
        assert!(ir.frequency.is_none());

        let rf = CommandRecord::rf("open", "sgcc", 433.92);
        assert_eq!(rf.signal_kind, SignalKind::Rf);
        assert_eq!(rf.frequency, Some(433.92));
    }

    #[test]
    fn test_patch_clears_optionals() {
        let mut device = DeviceRecord::new("tv", "TV", EntityKind::MediaPlayer).with_hub("rm4-pro");
        let patch = DevicePatch {
            display_name: Some("Living Room TV".into()),
            hub_reference: Some(None),
            group: None,
        };
        patch.apply(&mut device);
        assert_eq!(device.display_name, "Living Room TV");
        assert!(device.hub_reference.is_none());
    }

    #[test]
    fn test_frequency_omitted_in_json_for_ir() {
        let ir = CommandRecord::ir("turn_on", "JgBGAJKV");
        let json = serde_json::to_string(&ir).unwrap();
        assert!(!json.contains("frequency"));
    }
}
