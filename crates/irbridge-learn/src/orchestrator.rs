//! Session registry and concurrency guards.
//!
//! Runs capture sessions as independent tasks, enforces the
//! one-active-session-per-(device, command) rule, and keeps terminal
//! sessions queryable until pruned.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use irbridge_core::types::{CommandRecord, DeviceRecord, SignalKind};
use irbridge_core::{Error, Result};
use irbridge_storage::DeviceStore;

use crate::hub::HubClient;
use crate::session::{self, LearnConfig, LearnRequest, SessionId, SessionPhase, SessionStatus};

/// Where finished captures are persisted. The device store is the one
/// production implementation; tests substitute failing or recording
/// sinks.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn put_command(&self, device_id: &str, command: CommandRecord) -> Result<CommandRecord>;
}

#[async_trait]
impl CommandSink for DeviceStore {
    async fn put_command(&self, device_id: &str, command: CommandRecord) -> Result<CommandRecord> {
        DeviceStore::put_command(self, device_id, command)
            .await
            .map_err(Into::into)
    }
}

struct SessionEntry {
    tx: Arc<watch::Sender<SessionStatus>>,
    token: CancellationToken,
}

/// Removes the (device, command) reservation when the session task
/// ends, whatever the exit path.
struct ActiveGuard {
    active: Arc<DashMap<(String, String), SessionId>>,
    key: (String, String),
    session_id: SessionId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        // Only release a reservation this session still owns; a stale
        // one may already have been reclaimed by a newer session.
        self.active
            .remove_if(&self.key, |_, owner| *owner == self.session_id);
    }
}

/// Coordinates capture sessions against one hub client and one sink.
pub struct LearnOrchestrator {
    hub: Arc<dyn HubClient>,
    sink: Arc<dyn CommandSink>,
    config: LearnConfig,
    sessions: DashMap<SessionId, SessionEntry>,
    active: Arc<DashMap<(String, String), SessionId>>,
}

impl LearnOrchestrator {
    /// Create an orchestrator with default timing.
    pub fn new(hub: Arc<dyn HubClient>, sink: Arc<dyn CommandSink>) -> Self {
        Self::with_config(hub, sink, LearnConfig::default())
    }

    /// Create an orchestrator with custom timing.
    pub fn with_config(hub: Arc<dyn HubClient>, sink: Arc<dyn CommandSink>, config: LearnConfig) -> Self {
        Self {
            hub,
            sink,
            config,
            sessions: DashMap::new(),
            active: Arc::new(DashMap::new()),
        }
    }

    /// Start a capture session for one device command.
    ///
    /// Returns immediately with the session id; progress is observed
    /// via [`LearnOrchestrator::status`] or awaited with
    /// [`LearnOrchestrator::wait`]. A second request for the same
    /// (device, command) pair while one is in flight fails with
    /// [`Error::SessionInProgress`] instead of queuing.
    #[instrument(skip(self, device), fields(device_id = %device.id))]
    pub fn start(
        &self,
        device: &DeviceRecord,
        command_name: &str,
        signal_kind: SignalKind,
    ) -> Result<SessionId> {
        let hub_reference = device
            .hub_reference
            .clone()
            .ok_or_else(|| Error::HubUnreachable(format!("device {} has no hub reference", device.id)))?;

        let key = (device.id.clone(), command_name.to_string());
        let session_id: SessionId = Uuid::new_v4().to_string();

        match self.active.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                // The reservation is released by the task's drop guard,
                // which can lag the terminal status publish by an
                // instant; a reservation pointing at a finished session
                // is stale and may be reclaimed.
                let in_flight = self
                    .status(slot.get())
                    .is_some_and(|s| !s.is_terminal());
                if in_flight {
                    return Err(Error::SessionInProgress {
                        device_id: device.id.clone(),
                        command_name: command_name.to_string(),
                    });
                }
                slot.insert(session_id.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(session_id.clone());
            }
        }

        let request = LearnRequest {
            device_id: device.id.clone(),
            command_name: command_name.to_string(),
            signal_kind,
            hub_reference,
        };

        let (tx, _rx) = watch::channel(SessionStatus::new(session_id.clone(), &request));
        let tx = Arc::new(tx);
        let token = CancellationToken::new();

        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                tx: tx.clone(),
                token: token.clone(),
            },
        );

        let guard = ActiveGuard {
            active: self.active.clone(),
            key,
            session_id: session_id.clone(),
        };
        let hub = self.hub.clone();
        let sink = self.sink.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let _guard = guard;
            session::run(hub, sink, request, config, token, tx).await;
        });

        info!(session_id = %session_id, command_name, "capture session started");
        Ok(session_id)
    }

    /// Current status of a session, terminal or not.
    pub fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions.get(session_id).map(|e| e.tx.borrow().clone())
    }

    /// Wait until a session reaches a terminal phase.
    pub async fn wait(&self, session_id: &str) -> Result<SessionStatus> {
        let mut rx = {
            let entry = self
                .sessions
                .get(session_id)
                .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
            entry.tx.subscribe()
        };

        loop {
            {
                let status = rx.borrow_and_update();
                if status.is_terminal() {
                    return Ok(status.clone());
                }
            }
            if rx.changed().await.is_err() {
                // Sender gone without a terminal phase; report what we saw.
                return Ok(rx.borrow().clone());
            }
        }
    }

    /// Request cooperative cancellation. A no-op for sessions that
    /// already ended; [`Error::NotFound`] for unknown ids.
    pub fn cancel(&self, session_id: &str) -> Result<()> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        entry.token.cancel();
        Ok(())
    }

    /// Retry only the store step of a session that captured a signal
    /// but failed to persist it.
    pub async fn commit_captured(&self, session_id: &str) -> Result<SessionStatus> {
        let (tx, record, device_id) = {
            let entry = self
                .sessions
                .get(session_id)
                .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
            let status = entry.tx.borrow().clone();
            let record = status
                .captured
                .ok_or_else(|| Error::NotFound(format!("session {session_id} has no captured command")))?;
            (entry.tx.clone(), record, status.device_id)
        };

        self.sink.put_command(&device_id, record).await?;
        tx.send_modify(|s| {
            s.phase = SessionPhase::Succeeded;
            s.error = None;
            s.captured = None;
        });
        let status = tx.borrow().clone();
        Ok(status)
    }

    /// Drop terminal sessions from the registry. Returns how many were
    /// removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.tx.borrow().is_terminal());
        before - self.sessions.len()
    }

    /// Number of sessions currently tracked (active and terminal).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
