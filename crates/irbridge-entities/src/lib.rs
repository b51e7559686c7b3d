//! Capability mapping and entity/helper generation.
//!
//! Classifies a device's learned command set against a fixed capability
//! taxonomy, then renders entity and helper definitions for the target
//! automation platform. Generation is a pure function of the device
//! records: a full rebuild every time, byte-identical for identical
//! input.

pub mod capability;
pub mod error;
pub mod generator;

pub use capability::{map, suggested_commands, CapabilityAssignment, NoCapabilitiesWarning};
pub use error::{Error, Result};
pub use generator::{generate, ArtifactSet, EntityArtifact, HelperArtifact};
