//! Default configuration constants and environment variable names.
//!
//! Collected here so individual crates do not redefine the same values.

/// File-system defaults.
pub mod paths {
    /// Default device store file.
    pub const DATA_FILE: &str = "devices.json";
    /// Suffix for the rolling backup kept next to the store file.
    pub const BACKUP_SUFFIX: &str = ".bak";
    /// Suffix for staged writes before the atomic rename.
    pub const TMP_SUFFIX: &str = ".tmp";
    /// Default rendered artifact file.
    pub const OUTPUT_FILE: &str = "irbridge_entities.yaml";
}

/// Capture-session timing.
pub mod learn {
    use std::time::Duration;

    /// Budget for establishing the hub channel.
    pub const PREPARE_DEADLINE: Duration = Duration::from_secs(5);
    /// Budget for a single IR capture.
    pub const IR_DEADLINE: Duration = Duration::from_secs(30);
    /// Shared budget across the RF sweep and capture sub-phases.
    pub const RF_DEADLINE: Duration = Duration::from_secs(30);
    /// Transient-error retries while preparing, before giving up.
    pub const PREPARE_RETRIES: u32 = 3;
    /// Delay between prepare retries.
    pub const PREPARE_RETRY_DELAY: Duration = Duration::from_millis(500);
}

/// Environment variable names.
pub mod env_vars {
    pub const DATA_FILE: &str = "IRBRIDGE_DATA_FILE";
    pub const OUTPUT_FILE: &str = "IRBRIDGE_OUTPUT_FILE";
    pub const HUB_URL: &str = "IRBRIDGE_HUB_URL";
    pub const LOG: &str = "IRBRIDGE_LOG";
}
