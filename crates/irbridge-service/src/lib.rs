//! Caller-facing service facade.
//!
//! Wires the device store, the learning orchestrator and the entity
//! generator into the operation surface consumed by front-end layers.
//! Artifact rebuilds render to a staging file and swap atomically, so
//! a failed rebuild never leaves a half-written output.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use irbridge_core::config::paths;
use irbridge_core::types::{CommandRecord, DevicePatch, DeviceRecord, EntityKind, SignalKind};
use irbridge_core::{normalize, Error, Result};
use irbridge_entities::generator;
use irbridge_learn::{HubClient, LearnConfig, LearnOrchestrator, SessionId, SessionStatus};
use irbridge_storage::{DeviceStore, RecoveryReport};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Where the rendered artifact document is written.
    pub output_file: PathBuf,
    /// Rebuild artifacts after every store mutation, not only on
    /// explicit request.
    pub auto_generate: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from(paths::OUTPUT_FILE),
            auto_generate: true,
        }
    }
}

/// Result of one artifact rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RegenerateReport {
    pub output_file: PathBuf,
    pub entity_count: usize,
    pub helper_count: usize,
    /// Devices whose commands fill no capability slot. Non-fatal; their
    /// entities rendered without control wiring.
    pub no_capability_devices: Vec<String>,
}

/// The irbridge manager: device CRUD, command learning, artifact
/// generation.
pub struct BridgeService {
    store: Arc<DeviceStore>,
    orchestrator: LearnOrchestrator,
    config: ServiceConfig,
}

impl BridgeService {
    /// Assemble the service from its collaborators.
    pub fn new(store: Arc<DeviceStore>, hub: Arc<dyn HubClient>, config: ServiceConfig) -> Self {
        let orchestrator = LearnOrchestrator::new(hub, store.clone());
        Self {
            store,
            orchestrator,
            config,
        }
    }

    /// Assemble the service with custom capture timing.
    pub fn with_learn_config(
        store: Arc<DeviceStore>,
        hub: Arc<dyn HubClient>,
        config: ServiceConfig,
        learn: LearnConfig,
    ) -> Self {
        let orchestrator = LearnOrchestrator::with_config(hub, store.clone(), learn);
        Self {
            store,
            orchestrator,
            config,
        }
    }

    /// Recovery signal from the store's last open/reload.
    pub async fn recovery_report(&self) -> RecoveryReport {
        self.store.recovery_report().await
    }

    // ── Device CRUD ──────────────────────────────────────────────

    pub async fn create_device(
        &self,
        display_name: &str,
        entity_kind: EntityKind,
        hub_reference: Option<String>,
    ) -> Result<DeviceRecord> {
        let device = self
            .store
            .create(display_name, entity_kind, hub_reference)
            .await?;
        self.auto_regenerate().await;
        Ok(device)
    }

    pub async fn get_device(&self, id: &str) -> Result<DeviceRecord> {
        self.store.get(id).await.map_err(Into::into)
    }

    pub async fn list_devices(&self) -> Vec<DeviceRecord> {
        self.store.list().await
    }

    pub async fn update_device(&self, id: &str, patch: DevicePatch) -> Result<DeviceRecord> {
        let device = self.store.update(id, patch).await?;
        self.auto_regenerate().await;
        Ok(device)
    }

    pub async fn delete_device(&self, id: &str) -> Result<DeviceRecord> {
        let device = self.store.delete(id).await?;
        self.auto_regenerate().await;
        Ok(device)
    }

    // ── Command learning ─────────────────────────────────────────

    /// Start learning one command. The raw command name is normalized
    /// the same way device names are, so stored keys are always valid
    /// slugs.
    pub async fn learn(
        &self,
        device_id: &str,
        command_name: &str,
        signal_kind: SignalKind,
    ) -> Result<SessionId> {
        let name = normalize(command_name)?;
        let device = self.store.get(device_id).await?;
        self.orchestrator.start(&device, &name, signal_kind)
    }

    /// Wait for a session to end; rebuilds artifacts after a success.
    pub async fn wait_learn(&self, session_id: &str) -> Result<SessionStatus> {
        let status = self.orchestrator.wait(session_id).await?;
        if status.phase == irbridge_learn::SessionPhase::Succeeded {
            self.auto_regenerate().await;
        }
        Ok(status)
    }

    /// Current status of a session, including terminal ones.
    pub fn learning_status(&self, session_id: &str) -> Option<SessionStatus> {
        self.orchestrator.status(session_id)
    }

    /// Request cooperative cancellation of a session.
    pub fn cancel_learning(&self, session_id: &str) -> Result<()> {
        self.orchestrator.cancel(session_id)
    }

    /// Retry the store step of a capture whose persist failed.
    pub async fn commit_captured(&self, session_id: &str) -> Result<SessionStatus> {
        let status = self.orchestrator.commit_captured(session_id).await?;
        self.auto_regenerate().await;
        Ok(status)
    }

    pub async fn list_commands(&self, device_id: &str) -> Result<Vec<CommandRecord>> {
        self.store.list_commands(device_id).await.map_err(Into::into)
    }

    pub async fn delete_command(&self, device_id: &str, name: &str) -> Result<CommandRecord> {
        let removed = self.store.delete_command(device_id, name).await?;
        self.auto_regenerate().await;
        Ok(removed)
    }

    // ── Artifact generation ──────────────────────────────────────

    /// Rebuild all entity/helper definitions from the current store
    /// contents and swap them into the output file.
    pub async fn regenerate_entities(&self) -> Result<RegenerateReport> {
        // One consistent snapshot for the whole rebuild.
        let devices = self.store.list().await;
        let set = generator::generate(&devices);
        let yaml = set.to_yaml().map_err(irbridge_core::Error::from)?;

        write_staged(&self.config.output_file, yaml.as_bytes())?;
        info!(
            output = %self.config.output_file.display(),
            entities = set.entities.len(),
            "entity definitions regenerated"
        );

        Ok(RegenerateReport {
            output_file: self.config.output_file.clone(),
            entity_count: set.entities.len(),
            helper_count: set.helpers.len(),
            no_capability_devices: set.warnings.into_iter().map(|w| w.device_id).collect(),
        })
    }

    async fn auto_regenerate(&self) {
        if !self.config.auto_generate {
            return;
        }
        if let Err(e) = self.regenerate_entities().await {
            // A mutation must not fail because rendering did; the
            // caller can re-run regeneration explicitly.
            warn!(error = %e, "automatic artifact regeneration failed");
        }
    }
}

/// Write via a staging file and atomic rename.
fn write_staged(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let staged = {
        let mut os = path.as_os_str().to_owned();
        os.push(paths::TMP_SUFFIX);
        PathBuf::from(os)
    };
    {
        let mut f = fs::File::create(&staged)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    fs::rename(&staged, path).map_err(Error::from)
}
