//! The hub collaborator boundary.
//!
//! The hub's own transceiver firmware and session bring-up are opaque;
//! this trait is the whole contract the orchestrator relies on.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use irbridge_core::types::SignalKind;

/// Opaque reference to one in-flight capture on the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle(pub String);

/// One event produced by an armed capture.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    /// RF sweep locked onto a carrier frequency (MHz). The capture
    /// stays armed; the next event carries the code.
    FrequencyLocked { frequency: f64 },
    /// A signal was received; `code` is the opaque payload.
    Code { code: String },
}

/// Hub communication errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// Hub not reachable (network/auth failure).
    #[error("hub unreachable: {0}")]
    Unreachable(String),

    /// The hub reported no signal within the deadline.
    #[error("no signal before deadline")]
    Timeout,

    /// The hub answered but the exchange failed.
    #[error("hub protocol error: {0}")]
    Protocol(String),
}

impl HubError {
    /// Transient errors may be retried during session preparation.
    /// Errors during the learning phases never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, HubError::Unreachable(_))
    }
}

/// Client side of the hub capture protocol.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Arm the hub for one capture of `signal_kind`.
    async fn begin_capture(
        &self,
        hub_reference: &str,
        signal_kind: SignalKind,
    ) -> Result<CaptureHandle, HubError>;

    /// Wait for the next event on an armed capture. Returns
    /// [`HubError::Timeout`] when `deadline` elapses with no signal.
    async fn await_signal(
        &self,
        handle: &CaptureHandle,
        deadline: Duration,
    ) -> Result<SignalEvent, HubError>;

    /// Abort an armed capture. Best effort; errors are logged, not
    /// propagated, since the session is already winding down.
    async fn cancel(&self, handle: &CaptureHandle) -> Result<(), HubError>;
}
