use crate::core::agent::DEFAULT_MAX_STEPS;
use crate::core::proposals::{AutoDecision, DuplicatePolicy, ProposalStoreOptions};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub mission_id: String,

    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    pub control_plane: ControlPlaneConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_api: Option<RuntimeApiConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<HeartbeatConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<WatchdogConfig>,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub proposals: ProposalsConfig,
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

// ── Control plane ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// ── Runtime administration API ───────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeApiConfig {
    #[serde(default = "default_runtime_api_host")]
    pub host: String,
    pub port: u16,
    /// Bearer token required on every request when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

fn default_runtime_api_host() -> String {
    "127.0.0.1".into()
}

impl RuntimeApiConfig {
    pub fn new(port: u16) -> Self {
        Self {
            host: default_runtime_api_host(),
            port,
            auth_token: None,
        }
    }
}

// ── Runtime events ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub base_url: String,
    pub agent_id: String,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub base_url: String,
    pub agent_id: String,
    /// Request process shutdown after a crash report.
    #[serde(default)]
    pub auto_exit: bool,
}

// ── Plugins ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Built-in plugin names to register, in order.
    #[serde(default)]
    pub enabled: Vec<String>,
}

// ── Proposals ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_decision: Option<AutoDecision>,
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
}

impl ProposalsConfig {
    pub fn store_options(&self) -> ProposalStoreOptions {
        ProposalStoreOptions {
            timeout: self.timeout_ms.map(Duration::from_millis),
            auto_decision: self.auto_decision,
            duplicate_policy: self.on_duplicate,
        }
    }
}

impl Config {
    pub fn new(mission_id: impl Into<String>, control_plane_url: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            max_steps: DEFAULT_MAX_STEPS,
            control_plane: ControlPlaneConfig {
                base_url: control_plane_url.into(),
                api_key: None,
            },
            runtime_api: None,
            heartbeat: None,
            watchdog: None,
            plugins: PluginsConfig::default(),
            proposals: ProposalsConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mission_id.trim().is_empty() {
            return Err(ConfigError::Validation("mission_id must not be empty".into()));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Validation("max_steps must be >= 1".into()));
        }
        validate_url("control_plane.base_url", &self.control_plane.base_url)?;

        if let Some(heartbeat) = &self.heartbeat {
            validate_url("heartbeat.base_url", &heartbeat.base_url)?;
            if heartbeat.agent_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "heartbeat.agent_id must not be empty".into(),
                ));
            }
            if heartbeat.interval_ms == 0 {
                return Err(ConfigError::Validation(
                    "heartbeat.interval_ms must be >= 1".into(),
                ));
            }
        }

        if let Some(watchdog) = &self.watchdog {
            validate_url("watchdog.base_url", &watchdog.base_url)?;
            if watchdog.agent_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "watchdog.agent_id must not be empty".into(),
                ));
            }
        }

        for name in &self.plugins.enabled {
            if !crate::plugins::BUILTIN_PLUGINS.contains(&name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "unknown plugin '{name}' (available: {})",
                    crate::plugins::BUILTIN_PLUGINS.join(", ")
                )));
            }
        }

        if self.proposals.timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "proposals.timeout_ms must be >= 1 when set".into(),
            ));
        }
        Ok(())
    }
}

fn validate_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} must not be empty")));
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| ConfigError::Validation(format!("{field} is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{field} must use http or https"
        )));
    }
    Ok(())
}
