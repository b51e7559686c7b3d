//! Durable device/command storage.
//!
//! A single JSON file is the source of truth. Every mutation rewrites
//! the whole file through a temp-file + fsync + atomic-rename protocol,
//! with a rolling backup taken before each replacement so a corrupted
//! primary can be recovered on the next open.

pub mod error;
pub mod file;
pub mod store;

pub use error::{Error, Result};
pub use store::{DeviceStore, RecoveryReport};
