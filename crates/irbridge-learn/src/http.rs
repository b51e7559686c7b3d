//! HTTP transport for the hub boundary.
//!
//! Talks to a hub bridge daemon exposing the capture protocol over
//! plain JSON endpoints with long-polled signal waits.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use irbridge_core::types::SignalKind;

use crate::hub::{CaptureHandle, HubClient, HubError, SignalEvent};

/// Hub client over HTTP.
pub struct HttpHub {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BeginResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct EventResponse {
    #[serde(default)]
    frequency: Option<f64>,
    #[serde(default)]
    code: Option<String>,
}

impl HttpHub {
    /// Create a client for a bridge daemon at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn map_err(e: reqwest::Error) -> HubError {
        if e.is_connect() || e.is_timeout() {
            HubError::Unreachable(e.to_string())
        } else {
            HubError::Protocol(e.to_string())
        }
    }
}

#[async_trait]
impl HubClient for HttpHub {
    async fn begin_capture(
        &self,
        hub_reference: &str,
        signal_kind: SignalKind,
    ) -> Result<CaptureHandle, HubError> {
        let url = format!("{}/hubs/{}/capture", self.base_url, hub_reference);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "signal_kind": signal_kind.as_str() }))
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;
        let body: BeginResponse = resp.json().await.map_err(Self::map_err)?;
        debug!(hub = hub_reference, handle = %body.handle, "capture armed");
        Ok(CaptureHandle(body.handle))
    }

    async fn await_signal(
        &self,
        handle: &CaptureHandle,
        deadline: Duration,
    ) -> Result<SignalEvent, HubError> {
        let url = format!(
            "{}/capture/{}/event?timeout_ms={}",
            self.base_url,
            handle.0,
            deadline.as_millis()
        );
        let resp = self
            .client
            .get(&url)
            // Leave headroom over the long-poll window so the daemon
            // answers the timeout before the socket does.
            .timeout(deadline + Duration::from_secs(5))
            .send()
            .await
            .map_err(Self::map_err)?;

        if resp.status() == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(HubError::Timeout);
        }
        let resp = resp.error_for_status().map_err(Self::map_err)?;
        let body: EventResponse = resp.json().await.map_err(Self::map_err)?;

        match (body.code, body.frequency) {
            (Some(code), _) => Ok(SignalEvent::Code { code }),
            (None, Some(frequency)) => Ok(SignalEvent::FrequencyLocked { frequency }),
            (None, None) => Err(HubError::Protocol("event carried neither code nor frequency".into())),
        }
    }

    async fn cancel(&self, handle: &CaptureHandle) -> Result<(), HubError> {
        let url = format!("{}/capture/{}/cancel", self.base_url, handle.0);
        self.client
            .post(&url)
            .send()
            .await
            .map_err(Self::map_err)?
            .error_for_status()
            .map_err(Self::map_err)?;
        Ok(())
    }
}
