use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A step submitted to the control plane for approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProposal {
    pub mission_id: String,
    pub step_id: String,
    pub action: String,
    pub payload: Value,
}

/// Outcome of an approved step, reported after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub mission_id: String,
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneDecision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ControlPlaneDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

/// The external authority that gates every step.
///
/// Implementations must be interchangeable: the agent loop behaves identically
/// for any conforming control plane.
#[async_trait]
pub trait ControlPlanePort: Send + Sync {
    async fn propose_step(&self, proposal: &StepProposal) -> anyhow::Result<ControlPlaneDecision>;

    async fn report_result(&self, result: &StepResult) -> anyhow::Result<()>;
}
