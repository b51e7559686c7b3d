//! Capability taxonomy and command-name canonicalization.
//!
//! This table is the single normative command vocabulary: UI layers and
//! suggestion lists query it instead of carrying their own copies.

use std::collections::BTreeMap;

use irbridge_core::types::EntityKind;

/// Highest numbered fan speed slot.
pub const MAX_SPEED: u8 = 5;

const LIGHT_SLOTS: &[&str] = &["turn_on", "turn_off", "brightness_up", "brightness_down"];
const FAN_SLOTS: &[&str] = &[
    "turn_on", "turn_off", "speed_1", "speed_2", "speed_3", "speed_4", "speed_5", "oscillate",
    "direction",
];
const SWITCH_SLOTS: &[&str] = &["turn_on", "turn_off"];
const MEDIA_PLAYER_SLOTS: &[&str] = &[
    "turn_on",
    "turn_off",
    "volume_up",
    "volume_down",
    "mute",
    "play",
    "pause",
    "stop",
    "next_track",
    "previous_track",
];
const COVER_SLOTS: &[&str] = &["open", "close", "stop"];
const CLIMATE_SLOTS: &[&str] = &[
    "turn_on", "turn_off", "temp_up", "temp_down", "mode_heat", "mode_cool", "mode_auto",
];

/// Capability slots defined for an entity kind, in rendering order.
pub fn slots(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Light => LIGHT_SLOTS,
        EntityKind::Fan => FAN_SLOTS,
        EntityKind::Switch => SWITCH_SLOTS,
        EntityKind::MediaPlayer => MEDIA_PLAYER_SLOTS,
        EntityKind::Cover => COVER_SLOTS,
        EntityKind::Climate => CLIMATE_SLOTS,
    }
}

/// Suggested command names for a kind (the canonical slot names).
///
/// The one list frontends should offer when learning commands.
pub fn suggested_commands(kind: EntityKind) -> Vec<&'static str> {
    slots(kind).to_vec()
}

/// Known alternate spellings, independent of entity kind. A resolved
/// alias still has to name a slot of the device's kind to count.
fn alias(name: &str) -> Option<&'static str> {
    Some(match name {
        "on" | "power_on" => "turn_on",
        "off" | "power_off" => "turn_off",
        "low" | "speed_low" | "fan_speed_low" => "speed_1",
        "med" | "medium" | "speed_medium" | "speed_med" | "fan_speed_medium" => "speed_2",
        "high" | "speed_high" | "fan_speed_high" => "speed_3",
        "brighten" | "bright_up" => "brightness_up",
        "dim" | "bright_down" => "brightness_down",
        "up" => "open",
        "down" => "close",
        "vol_up" => "volume_up",
        "vol_down" => "volume_down",
        "next" => "next_track",
        "prev" | "previous" => "previous_track",
        "heat" => "mode_heat",
        "cool" => "mode_cool",
        "auto" => "mode_auto",
        "warmer" | "temperature_up" => "temp_up",
        "cooler" | "temperature_down" => "temp_down",
        _ => return None,
    })
}

/// Numeric speed forms: `speed_N` and `fan_speed_N` for N in 1..=MAX_SPEED.
fn numeric_speed(name: &str) -> Option<&'static str> {
    let n = name
        .strip_prefix("fan_speed_")
        .or_else(|| name.strip_prefix("speed_"))?;
    match n {
        "1" => Some("speed_1"),
        "2" => Some("speed_2"),
        "3" => Some("speed_3"),
        "4" => Some("speed_4"),
        "5" => Some("speed_5"),
        _ => None,
    }
}

/// Resolve a command name to a canonical slot of `kind`, if any.
pub fn canonical_slot(kind: EntityKind, name: &str) -> Option<&'static str> {
    if let Some(slot) = slots(kind).iter().copied().find(|s| *s == name) {
        return Some(slot);
    }
    let resolved = numeric_speed(name).or_else(|| alias(name))?;
    slots(kind).contains(&resolved).then_some(resolved)
}

/// Non-fatal signal: a device whose commands fill no capability slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoCapabilitiesWarning {
    pub device_id: String,
}

/// Which command fills each capability slot of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityAssignment {
    pub kind: EntityKind,
    /// Slot name -> learned command name, filled slots only.
    pub filled: BTreeMap<&'static str, String>,
    /// Command names that map to no slot; preserved verbatim for
    /// direct invocation, never wired into entity controls.
    pub custom: Vec<String>,
}

impl CapabilityAssignment {
    /// Command name assigned to a slot, if any.
    pub fn command_for(&self, slot: &str) -> Option<&str> {
        self.filled.get(slot).map(String::as_str)
    }

    /// True when not a single slot is filled.
    pub fn is_empty(&self) -> bool {
        self.filled.is_empty()
    }

    /// Filled speed slots in ascending order (fan only).
    pub fn speed_slots(&self) -> Vec<&'static str> {
        self.filled
            .keys()
            .copied()
            .filter(|s| s.starts_with("speed_"))
            .collect()
    }
}

/// Classify a command set against the capability taxonomy of `kind`.
///
/// Pure and deterministic. When two names resolve to the same slot the
/// lexicographically first name wins and the loser is kept as custom.
pub fn map<'a>(kind: EntityKind, commands: impl IntoIterator<Item = &'a str>) -> CapabilityAssignment {
    let mut names: Vec<&str> = commands.into_iter().collect();
    names.sort_unstable();
    names.dedup();

    let mut filled: BTreeMap<&'static str, String> = BTreeMap::new();
    let mut custom = Vec::new();

    for name in names {
        match canonical_slot(kind, name) {
            Some(slot) if !filled.contains_key(slot) => {
                filled.insert(slot, name.to_string());
            }
            _ => custom.push(name.to_string()),
        }
    }

    CapabilityAssignment { kind, filled, custom }
}
