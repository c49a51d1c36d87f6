//! Posts runtime events (register, heartbeat, watchdog) to the monitoring
//! endpoint `{base_url}/agent/{agent_id}/heartbeat`.
//!
//! A rejected token or an unsupported protocol version comes back as a
//! fatal [`TransportError`]; the caller decides whether to shut down.

use crate::error::TransportError;
use crate::ports::{
    HeartbeatPayload, RegisterPayload, RuntimeEvent, RuntimeEventKind, WatchdogPayload,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const RUNTIME_TOKEN_ENV: &str = "RUNTIME_TOKEN";
const UNSUPPORTED_PROTOCOL: &str = "unsupported_protocol";

#[derive(Debug, Default, Deserialize)]
struct TransportResponse {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct RuntimeEventClient {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

impl RuntimeEventClient {
    /// Client authenticating with `RUNTIME_TOKEN` from the environment.
    pub fn from_env(base_url: &str, agent_id: &str) -> Self {
        Self::new(base_url, agent_id, std::env::var(RUNTIME_TOKEN_ENV).ok())
    }

    pub fn new(base_url: &str, agent_id: &str, token: Option<String>) -> Self {
        Self {
            endpoint: format!(
                "{}/agent/{agent_id}/heartbeat",
                base_url.trim_end_matches('/')
            ),
            token: token.filter(|t| !t.is_empty()),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send(&self, kind: RuntimeEventKind) -> Result<(), TransportError> {
        self.post(&RuntimeEvent::now(kind)).await.map(|_| ())
    }

    pub async fn heartbeat(&self, payload: HeartbeatPayload) -> Result<(), TransportError> {
        self.send(RuntimeEventKind::Heartbeat(payload)).await
    }

    pub async fn watchdog(&self, payload: WatchdogPayload) -> Result<(), TransportError> {
        self.send(RuntimeEventKind::Watchdog(payload)).await
    }

    /// Announce this runtime. Fails with `UnsupportedProtocol` when the
    /// server does not speak our protocol version.
    pub async fn register(&self, payload: RegisterPayload) -> Result<(), TransportError> {
        let response = self
            .post(&RuntimeEvent::now(RuntimeEventKind::Register(payload)))
            .await?;
        if response.error.as_deref() == Some(UNSUPPORTED_PROTOCOL) {
            tracing::error!(endpoint = %self.endpoint, "runtime protocol rejected by server");
            return Err(TransportError::UnsupportedProtocol);
        }
        Ok(())
    }

    async fn post(&self, event: &RuntimeEvent) -> Result<TransportResponse, TransportError> {
        let token = self.token.as_deref().ok_or(TransportError::MissingToken)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(event)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::error!(endpoint = %self.endpoint, "runtime token rejected");
            return Err(TransportError::Unauthorized);
        }

        // Bodies are optional and may not be JSON.
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<TransportResponse>(&text).unwrap_or_default();

        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        tracing::trace!(event = event.kind.name(), "runtime event delivered");
        Ok(body)
    }
}

impl std::fmt::Debug for RuntimeEventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeEventClient")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}
