use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire protocol version stamped on every runtime event.
pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HeartbeatStatus {
    Running,
    Idle,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub status: HeartbeatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
}

impl HeartbeatPayload {
    pub fn with_status(status: HeartbeatStatus) -> Self {
        Self {
            status,
            memory_size: None,
            token_usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogStatus {
    Crashed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogPayload {
    pub status: WatchdogStatus,
    pub error: WatchdogError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub runtime_id: String,
    #[serde(
        rename = "nodeEnv",
        alias = "environment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub environment: Option<String>,
    pub runtime_version: String,
}

/// Event kind and its typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum RuntimeEventKind {
    Heartbeat(HeartbeatPayload),
    Watchdog(WatchdogPayload),
    Register(RegisterPayload),
}

impl RuntimeEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heartbeat(_) => "heartbeat",
            Self::Watchdog(_) => "watchdog",
            Self::Register(_) => "register",
        }
    }
}

/// Envelope posted to the runtime monitoring endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvent {
    pub protocol_version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RuntimeEventKind,
}

impl RuntimeEvent {
    pub fn now(kind: RuntimeEventKind) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }
}
