//! Core types shared across the irbridge workspace.
//!
//! Defines device and command records, the slug normalizer, the common
//! error taxonomy, and default configuration constants.

pub mod config;
pub mod error;
pub mod slug;
pub mod types;

pub use error::{Error, Result};
pub use slug::normalize;
pub use types::{
    CommandRecord, DevicePatch, DeviceRecord, EntityKind, SignalKind,
};
