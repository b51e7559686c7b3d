//! Error types for the storage crate.

use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Name normalizes to an empty slug.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Device id already taken.
    #[error("device id already exists: {0}")]
    DuplicateId(String),

    /// Device or command lookup failed.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<Error> for irbridge_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => irbridge_core::Error::Io(e),
            Error::Serialization(e) => irbridge_core::Error::Serialization(e.to_string()),
            Error::InvalidName(s) => irbridge_core::Error::InvalidName(s),
            Error::DuplicateId(s) => irbridge_core::Error::DuplicateId(s),
            Error::NotFound(s) => irbridge_core::Error::NotFound(s),
        }
    }
}
