//! Entity and helper generation.
//!
//! `generate` is always a full rebuild from the complete device
//! snapshot. Nothing is diffed against previous output; the rendered
//! document is safe to write over any prior one unconditionally.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use irbridge_core::types::{DeviceRecord, EntityKind};

use crate::capability::{self, CapabilityAssignment, NoCapabilitiesWarning};
use crate::error::Result;

/// One primary entity definition, keyed by the device's bare id.
///
/// The id is never prefixed with the entity kind: the platform's
/// template mechanism requires a valid bare slug and rejects dotted or
/// prefixed identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityArtifact {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,
    pub hub_reference: Option<String>,
    /// Capability wiring from the mapper.
    pub assignment: CapabilityAssignment,
    /// Helper ids this entity reads its apparent state from.
    pub helper_ids: Vec<String>,
}

/// Auxiliary state-holding definition.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperArtifact {
    /// Boolean on/off flag.
    InputBoolean { name: String },
    /// Selectable state with fixed options.
    InputSelect { name: String, options: Vec<String> },
    /// Numeric step state.
    InputNumber { name: String, min: i64, max: i64, step: i64 },
}

/// Complete derived output for one rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactSet {
    pub entities: BTreeMap<String, EntityArtifact>,
    pub helpers: BTreeMap<String, HelperArtifact>,
    pub warnings: Vec<NoCapabilitiesWarning>,
}

/// Default speed options used when a fan has no speed command yet.
/// The helper must exist either way; learning a speed later must not
/// change the set of helpers, only their options.
const DEFAULT_SPEED_OPTIONS: [&str; 3] = ["speed_1", "speed_2", "speed_3"];

/// Brightness step range for light helpers.
const BRIGHTNESS_STEPS: (i64, i64) = (1, 10);

fn state_helper_base(device: &DeviceRecord) -> &str {
    // Grouped devices share one physical appliance and one apparent
    // power state, so the flag derives from the group label.
    device.group.as_deref().unwrap_or(&device.id)
}

fn helpers_for(device: &DeviceRecord, assignment: &CapabilityAssignment) -> Vec<(String, HelperArtifact)> {
    let mut out = Vec::new();

    let base = state_helper_base(device);
    out.push((
        format!("{base}_state"),
        HelperArtifact::InputBoolean {
            name: format!("{base} state"),
        },
    ));

    // Kind-specific helpers are emitted whenever the kind can need
    // them, never conditionally on which commands happen to exist.
    match device.entity_kind {
        EntityKind::Fan => {
            let speeds = assignment.speed_slots();
            let options = if speeds.is_empty() {
                DEFAULT_SPEED_OPTIONS.iter().map(|s| s.to_string()).collect()
            } else {
                speeds.iter().map(|s| s.to_string()).collect()
            };
            out.push((
                format!("{}_speed", device.id),
                HelperArtifact::InputSelect {
                    name: format!("{} speed", device.id),
                    options,
                },
            ));
        }
        EntityKind::Light => {
            out.push((
                format!("{}_brightness", device.id),
                HelperArtifact::InputNumber {
                    name: format!("{} brightness", device.id),
                    min: BRIGHTNESS_STEPS.0,
                    max: BRIGHTNESS_STEPS.1,
                    step: 1,
                },
            ));
        }
        EntityKind::Climate => {
            out.push((
                format!("{}_mode", device.id),
                HelperArtifact::InputSelect {
                    name: format!("{} mode", device.id),
                    options: vec!["off".into(), "heat".into(), "cool".into(), "auto".into()],
                },
            ));
        }
        EntityKind::Switch | EntityKind::MediaPlayer | EntityKind::Cover => {}
    }

    out
}

/// Rebuild all entity and helper definitions from a device snapshot.
///
/// Deterministic: the same snapshot always produces the same
/// `ArtifactSet`, and [`ArtifactSet::to_yaml`] renders it with stable
/// ordering, so two runs over an unchanged store are byte-identical.
pub fn generate(devices: &[DeviceRecord]) -> ArtifactSet {
    let mut set = ArtifactSet::default();

    let mut ordered: Vec<&DeviceRecord> = devices.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    for device in ordered {
        let names: Vec<&str> = device.commands.keys().map(String::as_str).collect();
        let assignment = capability::map(device.entity_kind, names);

        if assignment.is_empty() {
            set.warnings.push(NoCapabilitiesWarning {
                device_id: device.id.clone(),
            });
        }

        let mut helper_ids = Vec::new();
        for (id, helper) in helpers_for(device, &assignment) {
            helper_ids.push(id.clone());
            // First emission wins; grouped devices sharing a derived id
            // produce the same helper, so duplicates are dropped.
            set.helpers.entry(id).or_insert(helper);
        }

        set.entities.insert(
            device.id.clone(),
            EntityArtifact {
                id: device.id.clone(),
                kind: device.entity_kind,
                name: device.display_name.clone(),
                hub_reference: device.hub_reference.clone(),
                assignment,
                helper_ids,
            },
        );
    }

    debug!(
        entities = set.entities.len(),
        helpers = set.helpers.len(),
        warnings = set.warnings.len(),
        "artifact set generated"
    );
    set
}

fn entity_value(entity: &EntityArtifact) -> Value {
    let mut body = Mapping::new();
    body.insert("name".into(), entity.name.clone().into());
    if let Some(hub) = &entity.hub_reference {
        body.insert("hub".into(), hub.clone().into());
    }

    // Slots in the taxonomy's rendering order; unassigned slots are
    // simply omitted from the entity's control wiring.
    let mut commands = Mapping::new();
    for slot in capability::slots(entity.kind) {
        if let Some(command) = entity.assignment.command_for(slot) {
            commands.insert((*slot).into(), command.into());
        }
    }
    body.insert("commands".into(), Value::Mapping(commands));

    if !entity.assignment.custom.is_empty() {
        let custom: Vec<Value> = entity.assignment.custom.iter().map(|c| c.clone().into()).collect();
        body.insert("custom_commands".into(), Value::Sequence(custom));
    }

    let helpers: Vec<Value> = entity.helper_ids.iter().map(|h| h.clone().into()).collect();
    body.insert("helpers".into(), Value::Sequence(helpers));

    Value::Mapping(body)
}

fn helper_value(helper: &HelperArtifact) -> Value {
    let mut body = Mapping::new();
    match helper {
        HelperArtifact::InputBoolean { name } => {
            body.insert("name".into(), name.clone().into());
        }
        HelperArtifact::InputSelect { name, options } => {
            body.insert("name".into(), name.clone().into());
            let options: Vec<Value> = options.iter().map(|o| o.clone().into()).collect();
            body.insert("options".into(), Value::Sequence(options));
        }
        HelperArtifact::InputNumber { name, min, max, step } => {
            body.insert("name".into(), name.clone().into());
            body.insert("min".into(), (*min).into());
            body.insert("max".into(), (*max).into());
            body.insert("step".into(), (*step).into());
        }
    }
    Value::Mapping(body)
}

impl ArtifactSet {
    /// Render the whole set as one deterministic YAML document.
    pub fn to_yaml(&self) -> Result<String> {
        let mut root = Mapping::new();

        // Entity sections, one per kind present, in fixed kind order.
        for kind in EntityKind::ALL {
            let mut section = Mapping::new();
            for entity in self.entities.values().filter(|e| e.kind == kind) {
                section.insert(entity.id.clone().into(), entity_value(entity));
            }
            if !section.is_empty() {
                root.insert(kind.as_str().into(), Value::Mapping(section));
            }
        }

        // Helper sections bucketed by helper type.
        let mut booleans = Mapping::new();
        let mut selects = Mapping::new();
        let mut numbers = Mapping::new();
        for (id, helper) in &self.helpers {
            let (section, value) = match helper {
                HelperArtifact::InputBoolean { .. } => (&mut booleans, helper_value(helper)),
                HelperArtifact::InputSelect { .. } => (&mut selects, helper_value(helper)),
                HelperArtifact::InputNumber { .. } => (&mut numbers, helper_value(helper)),
            };
            section.insert(id.clone().into(), value);
        }
        for (label, section) in [
            ("input_boolean", booleans),
            ("input_select", selects),
            ("input_number", numbers),
        ] {
            if !section.is_empty() {
                root.insert(label.into(), Value::Mapping(section));
            }
        }

        Ok(serde_yaml::to_string(&Value::Mapping(root))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irbridge_core::types::CommandRecord;

    fn fan_with_speeds() -> DeviceRecord {
        let mut device = DeviceRecord::new("bedroom_fan", "Bedroom Fan", EntityKind::Fan);
        for name in ["turn_on", "turn_off", "speed_low", "speed_medium", "speed_high"] {
            device.commands.insert(name.into(), CommandRecord::ir(name, "JgBG"));
        }
        device
    }

    #[test]
    fn test_fan_scenario_entity_and_speed_helper() {
        let set = generate(&[fan_with_speeds()]);

        let entity = &set.entities["bedroom_fan"];
        assert_eq!(entity.id, "bedroom_fan");
        assert_eq!(entity.assignment.command_for("speed_1"), Some("speed_low"));

        match &set.helpers["bedroom_fan_speed"] {
            HelperArtifact::InputSelect { options, .. } => {
                assert_eq!(options, &["speed_1", "speed_2", "speed_3"]);
            }
            other => panic!("expected input_select, got {other:?}"),
        }

        let yaml = set.to_yaml().unwrap();
        assert!(yaml.contains("bedroom_fan:"));
        assert!(!yaml.contains("fan.bedroom_fan"));
    }

    #[test]
    fn test_helpers_emitted_even_without_matching_commands() {
        // A fan with no speed commands still gets its speed helper.
        let device = DeviceRecord::new("desk_fan", "Desk Fan", EntityKind::Fan);
        let set = generate(&[device]);

        match &set.helpers["desk_fan_speed"] {
            HelperArtifact::InputSelect { options, .. } => {
                assert_eq!(options, &["speed_1", "speed_2", "speed_3"]);
            }
            other => panic!("expected input_select, got {other:?}"),
        }
        assert!(set.helpers.contains_key("desk_fan_state"));
    }

    #[test]
    fn test_no_capabilities_warns_but_still_renders() {
        let mut device = DeviceRecord::new("weird_box", "Weird Box", EntityKind::Switch);
        device.commands.insert("beep".into(), CommandRecord::ir("beep", "JgBG"));

        let set = generate(&[device]);
        assert_eq!(set.warnings.len(), 1);
        assert_eq!(set.warnings[0].device_id, "weird_box");
        assert!(set.entities.contains_key("weird_box"));
        assert_eq!(set.entities["weird_box"].assignment.custom, vec!["beep".to_string()]);
    }

    #[test]
    fn test_grouped_devices_share_state_helper() {
        let light = DeviceRecord::new("ceiling_light", "Ceiling Light", EntityKind::Light)
            .with_group("ceiling_combo");
        let fan = DeviceRecord::new("ceiling_fan", "Ceiling Fan", EntityKind::Fan)
            .with_group("ceiling_combo");

        let set = generate(&[light, fan]);
        // One shared state flag, not one per member.
        assert!(set.helpers.contains_key("ceiling_combo_state"));
        assert!(!set.helpers.contains_key("ceiling_light_state"));
        assert!(!set.helpers.contains_key("ceiling_fan_state"));
        // Kind-specific helpers stay per device.
        assert!(set.helpers.contains_key("ceiling_fan_speed"));
        assert!(set.helpers.contains_key("ceiling_light_brightness"));
        // Both entities rendered independently.
        assert_eq!(set.entities.len(), 2);
    }

    #[test]
    fn test_generation_is_byte_identical() {
        let devices = vec![
            fan_with_speeds(),
            DeviceRecord::new("tv", "TV", EntityKind::MediaPlayer),
        ];
        let a = generate(&devices).to_yaml().unwrap();
        let b = generate(&devices).to_yaml().unwrap();
        assert_eq!(a, b);

        // Device order must not matter either.
        let reversed: Vec<DeviceRecord> = devices.iter().rev().cloned().collect();
        let c = generate(&reversed).to_yaml().unwrap();
        assert_eq!(a, c);
    }
}
