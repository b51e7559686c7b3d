//! Command learning orchestration.
//!
//! Drives a hub transceiver through the IR/RF capture phases as a
//! cancellable, observable session. Captured commands are handed to
//! the device store; a session never persists anything on timeout or
//! cancellation.

pub mod hub;
#[cfg(feature = "http")]
pub mod http;
pub mod orchestrator;
pub mod session;

pub use hub::{CaptureHandle, HubClient, HubError, SignalEvent};
#[cfg(feature = "http")]
pub use http::HttpHub;
pub use orchestrator::{CommandSink, LearnOrchestrator};
pub use session::{LearnConfig, LearnRequest, SessionId, SessionPhase, SessionStatus};
