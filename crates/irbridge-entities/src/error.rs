//! Error types for the entities crate.

use thiserror::Error;

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Generation error types. Mapping itself is total; only rendering to
/// the output dialect can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// YAML rendering error.
    #[error("render error: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl From<Error> for irbridge_core::Error {
    fn from(e: Error) -> Self {
        irbridge_core::Error::Serialization(e.to_string())
    }
}
