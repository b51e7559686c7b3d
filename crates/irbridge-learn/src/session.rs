//! Capture-session state machine.
//!
//! One session drives the hub through the acquisition phases for a
//! single (device, command) learn attempt:
//!
//! ```text
//! PREPARING -> LEARNING_IR                          -> CAPTURED -> SUCCEEDED
//! PREPARING -> LEARNING_RF_SWEEP -> LEARNING_RF_CAPTURE -> CAPTURED -> SUCCEEDED
//! any non-terminal -> CANCELLED | TIMED_OUT | FAILED
//! ```
//!
//! The RF sweep and capture sub-phases share one deadline budget;
//! elapsed sweep time carries over instead of re-arming the timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use irbridge_core::config::learn as defaults;
use irbridge_core::types::{CommandRecord, SignalKind};
use irbridge_core::Error;

use crate::hub::{CaptureHandle, HubClient, SignalEvent};
use crate::orchestrator::CommandSink;

/// Session identifier.
pub type SessionId = String;

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Preparing,
    LearningIr,
    LearningRfSweep,
    LearningRfCapture,
    Captured,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl SessionPhase {
    /// Check if the session has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Succeeded
                | SessionPhase::Failed
                | SessionPhase::Cancelled
                | SessionPhase::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Preparing => "preparing",
            SessionPhase::LearningIr => "learning_ir",
            SessionPhase::LearningRfSweep => "learning_rf_sweep",
            SessionPhase::LearningRfCapture => "learning_rf_capture",
            SessionPhase::Captured => "captured",
            SessionPhase::Succeeded => "succeeded",
            SessionPhase::Failed => "failed",
            SessionPhase::Cancelled => "cancelled",
            SessionPhase::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of one learn attempt.
#[derive(Debug, Clone)]
pub struct LearnRequest {
    pub device_id: String,
    pub command_name: String,
    pub signal_kind: SignalKind,
    pub hub_reference: String,
}

/// Timing knobs for capture sessions.
#[derive(Debug, Clone)]
pub struct LearnConfig {
    /// Budget for establishing the hub channel.
    pub prepare_deadline: Duration,
    /// Budget for a single IR capture.
    pub ir_deadline: Duration,
    /// Shared budget across RF sweep + capture.
    pub rf_deadline: Duration,
    /// Transient-error attempts while preparing.
    pub prepare_retries: u32,
    pub prepare_retry_delay: Duration,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            prepare_deadline: defaults::PREPARE_DEADLINE,
            ir_deadline: defaults::IR_DEADLINE,
            rf_deadline: defaults::RF_DEADLINE,
            prepare_retries: defaults::PREPARE_RETRIES,
            prepare_retry_delay: defaults::PREPARE_RETRY_DELAY,
        }
    }
}

/// Observable state of one session. Published on every phase change
/// and retained after the session ends, so a failure that happens
/// after the initiating call returned is still visible to a later
/// status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: SessionId,
    pub device_id: String,
    pub command_name: String,
    pub signal_kind: SignalKind,
    pub phase: SessionPhase,
    /// Locked RF carrier, present from the sweep lock onward. Discarded
    /// again if the session fails before capture completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured record retained only when the capture itself succeeded
    /// but the store write failed; lets the caller retry the store step
    /// without re-learning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<CommandRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub(crate) fn new(id: SessionId, request: &LearnRequest) -> Self {
        Self {
            id,
            device_id: request.device_id.clone(),
            command_name: request.command_name.clone(),
            signal_kind: request.signal_kind,
            phase: SessionPhase::Preparing,
            frequency: None,
            error: None,
            captured: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Check if the session has ended.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Internal early-exit reasons while driving the hub.
enum End {
    Cancelled,
    TimedOut(SessionPhase),
    Unreachable(String),
    Hub(String),
}

fn set_phase(tx: &watch::Sender<SessionStatus>, phase: SessionPhase) {
    tx.send_modify(|s| s.phase = phase);
}

fn finish(tx: &watch::Sender<SessionStatus>, phase: SessionPhase, error: Option<String>) {
    tx.send_modify(|s| {
        s.phase = phase;
        s.error = error;
        s.finished_at = Some(Utc::now());
        // A frequency lock is only meaningful on a completed capture.
        if phase != SessionPhase::Succeeded && s.captured.is_none() {
            s.frequency = None;
        }
    });
}

/// Drive one session to a terminal phase. Runs as its own task; all
/// observable state goes through `tx`.
pub(crate) async fn run(
    hub: Arc<dyn HubClient>,
    sink: Arc<dyn CommandSink>,
    request: LearnRequest,
    config: LearnConfig,
    token: CancellationToken,
    tx: Arc<watch::Sender<SessionStatus>>,
) {
    match drive(hub.as_ref(), &request, &config, &token, &tx).await {
        Ok((code, frequency)) => {
            tx.send_modify(|s| s.phase = SessionPhase::Captured);
            let record = match request.signal_kind {
                SignalKind::Ir => CommandRecord::ir(&request.command_name, code),
                SignalKind::Rf => CommandRecord {
                    name: request.command_name.clone(),
                    signal_kind: SignalKind::Rf,
                    code,
                    frequency,
                    learned_at: Utc::now(),
                },
            };
            match sink.put_command(&request.device_id, record.clone()).await {
                Ok(_) => {
                    info!(
                        device_id = %request.device_id,
                        command_name = %request.command_name,
                        "command learned"
                    );
                    finish(&tx, SessionPhase::Succeeded, None);
                }
                Err(e) => {
                    // The captured signal is not dropped: keep it so the
                    // store step can be retried without re-learning.
                    warn!(
                        device_id = %request.device_id,
                        command_name = %request.command_name,
                        error = %e,
                        "capture succeeded but store write failed"
                    );
                    tx.send_modify(|s| s.captured = Some(record.clone()));
                    finish(&tx, SessionPhase::Failed, Some(e.to_string()));
                }
            }
        }
        Err(End::Cancelled) => {
            info!(device_id = %request.device_id, "capture cancelled");
            finish(&tx, SessionPhase::Cancelled, Some(Error::CaptureCancelled.to_string()));
        }
        Err(End::TimedOut(phase)) => {
            let err = Error::CaptureTimeout {
                phase: phase.as_str().to_string(),
            };
            finish(&tx, SessionPhase::TimedOut, Some(err.to_string()));
        }
        Err(End::Unreachable(msg)) => {
            finish(
                &tx,
                SessionPhase::Failed,
                Some(Error::HubUnreachable(msg).to_string()),
            );
        }
        Err(End::Hub(msg)) => {
            finish(&tx, SessionPhase::Failed, Some(Error::Hub(msg).to_string()));
        }
    }
}

async fn drive(
    hub: &dyn HubClient,
    request: &LearnRequest,
    config: &LearnConfig,
    token: &CancellationToken,
    tx: &watch::Sender<SessionStatus>,
) -> Result<(String, Option<f64>), End> {
    let handle = prepare(hub, request, config, token).await?;

    match request.signal_kind {
        SignalKind::Ir => {
            set_phase(tx, SessionPhase::LearningIr);
            match wait_event(hub, &handle, config.ir_deadline, token, SessionPhase::LearningIr).await? {
                SignalEvent::Code { code } => Ok((code, None)),
                SignalEvent::FrequencyLocked { .. } => {
                    hub.cancel(&handle).await.ok();
                    Err(End::Hub("unexpected frequency event during IR capture".into()))
                }
            }
        }
        SignalKind::Rf => {
            // Elapsed sweep time counts against the capture phase too.
            let started = Instant::now();
            set_phase(tx, SessionPhase::LearningRfSweep);
            let frequency = match wait_event(
                hub,
                &handle,
                config.rf_deadline,
                token,
                SessionPhase::LearningRfSweep,
            )
            .await?
            {
                SignalEvent::FrequencyLocked { frequency } => frequency,
                SignalEvent::Code { .. } => {
                    hub.cancel(&handle).await.ok();
                    return Err(End::Hub("hub skipped the RF sweep phase".into()));
                }
            };
            tx.send_modify(|s| {
                s.phase = SessionPhase::LearningRfCapture;
                s.frequency = Some(frequency);
            });

            let remaining = config.rf_deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                hub.cancel(&handle).await.ok();
                return Err(End::TimedOut(SessionPhase::LearningRfCapture));
            }
            match wait_event(hub, &handle, remaining, token, SessionPhase::LearningRfCapture).await? {
                SignalEvent::Code { code } => Ok((code, Some(frequency))),
                SignalEvent::FrequencyLocked { .. } => {
                    hub.cancel(&handle).await.ok();
                    Err(End::Hub("duplicate frequency lock during RF capture".into()))
                }
            }
        }
    }
}

/// Establish the hub channel, retrying transient failures up to the
/// configured bound. Any eventual failure surfaces as hub-unreachable.
async fn prepare(
    hub: &dyn HubClient,
    request: &LearnRequest,
    config: &LearnConfig,
    token: &CancellationToken,
) -> Result<CaptureHandle, End> {
    let mut last_error = String::new();

    for attempt in 1..=config.prepare_retries.max(1) {
        if token.is_cancelled() {
            return Err(End::Cancelled);
        }

        let begin = hub.begin_capture(&request.hub_reference, request.signal_kind);
        tokio::select! {
            _ = token.cancelled() => return Err(End::Cancelled),
            res = tokio::time::timeout(config.prepare_deadline, begin) => match res {
                Ok(Ok(handle)) => return Ok(handle),
                Ok(Err(e)) => {
                    if !e.is_transient() {
                        return Err(End::Unreachable(e.to_string()));
                    }
                    warn!(attempt, error = %e, "hub prepare attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(attempt, "hub prepare deadline elapsed");
                    last_error = "preparation deadline elapsed".into();
                }
            },
        }

        if attempt < config.prepare_retries {
            tokio::time::sleep(config.prepare_retry_delay).await;
        }
    }

    Err(End::Unreachable(last_error))
}

/// Race one hub wait against cancellation and the wall-clock deadline.
/// The deadline is enforced locally as well as passed to the hub, so a
/// misbehaving hub cannot re-arm it.
async fn wait_event(
    hub: &dyn HubClient,
    handle: &CaptureHandle,
    deadline: Duration,
    token: &CancellationToken,
    phase: SessionPhase,
) -> Result<SignalEvent, End> {
    let result = tokio::select! {
        _ = token.cancelled() => {
            hub.cancel(handle).await.ok();
            return Err(End::Cancelled);
        }
        res = tokio::time::timeout(deadline, hub.await_signal(handle, deadline)) => res,
    };

    match result {
        Ok(Ok(event)) => Ok(event),
        Ok(Err(crate::hub::HubError::Timeout)) | Err(_) => {
            hub.cancel(handle).await.ok();
            Err(End::TimedOut(phase))
        }
        Ok(Err(e)) => {
            hub.cancel(handle).await.ok();
            Err(End::Hub(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(SessionPhase::Succeeded.is_terminal());
        assert!(SessionPhase::Cancelled.is_terminal());
        assert!(SessionPhase::TimedOut.is_terminal());
        assert!(SessionPhase::Failed.is_terminal());
        assert!(!SessionPhase::Preparing.is_terminal());
        assert!(!SessionPhase::Captured.is_terminal());
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(SessionPhase::LearningRfSweep.as_str(), "learning_rf_sweep");
        assert_eq!(SessionPhase::TimedOut.to_string(), "timed_out");
    }
}
