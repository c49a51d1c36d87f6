//! Start/stop tracking and proposal administration over one agent.

use crate::core::agent::{AgentRuntime, RunSummary};
use crate::core::proposals::{Proposal, ProposalStore};
use crate::error::AgentError;
use crate::ports::HeartbeatStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

const RUN_ABORTED: &str = "run aborted";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub struct RuntimeService {
    agent: Arc<AgentRuntime>,
    proposals: Arc<dyn ProposalStore>,
    status: Mutex<RuntimeStatus>,
}

impl RuntimeService {
    pub fn new(agent: Arc<AgentRuntime>, proposals: Arc<dyn ProposalStore>) -> Self {
        Self {
            agent,
            proposals,
            status: Mutex::new(RuntimeStatus::default()),
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, RuntimeStatus> {
        self.status
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Run the mission to completion. Returns `Ok(None)` without doing
    /// anything when a run is already in progress.
    pub async fn run(&self) -> Result<Option<RunSummary>, AgentError> {
        {
            let mut status = self.lock_status();
            if status.running {
                tracing::debug!(mission_id = %self.agent.mission_id(), "run ignored, already running");
                return Ok(None);
            }
            *status = RuntimeStatus {
                running: true,
                mission_id: Some(self.agent.mission_id().to_string()),
                started_at: Some(Utc::now()),
                stopped_at: None,
                last_error: None,
            };
        }

        let mut finish = RunFinish {
            service: self,
            error: None,
        };
        let outcome = self.agent.run().await;
        finish.error = Some(outcome.as_ref().err().map(ToString::to_string));
        drop(finish);

        outcome.map(Some)
    }

    pub fn status(&self) -> RuntimeStatus {
        self.lock_status().clone()
    }

    pub fn heartbeat_status(&self) -> HeartbeatStatus {
        if self.lock_status().running {
            HeartbeatStatus::Running
        } else {
            HeartbeatStatus::Idle
        }
    }

    pub fn list_proposals(&self) -> Vec<Proposal> {
        self.proposals.list()
    }

    pub fn get_proposal(&self, id: &str) -> Option<Proposal> {
        self.proposals.get(id)
    }

    pub fn approve_proposal(&self, id: &str) -> Option<Proposal> {
        self.proposals.approve(id)
    }

    pub fn reject_proposal(&self, id: &str, reason: Option<String>) -> Option<Proposal> {
        self.proposals.reject(id, reason)
    }
}

/// Marks the run stopped when dropped, including when the run panics or
/// its future is dropped before completing.
struct RunFinish<'a> {
    service: &'a RuntimeService,
    /// `None` until the run produced an outcome.
    error: Option<Option<String>>,
}

impl Drop for RunFinish<'_> {
    fn drop(&mut self) {
        let last_error = match self.error.take() {
            Some(error) => error,
            None => {
                tracing::warn!(mission_id = %self.service.agent.mission_id(), "mission run aborted");
                Some(RUN_ABORTED.to_string())
            }
        };
        let mut status = self.service.lock_status();
        status.running = false;
        status.stopped_at = Some(Utc::now());
        status.last_error = last_error;
    }
}

impl std::fmt::Debug for RuntimeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeService")
            .field("agent", &self.agent)
            .field("status", &*self.lock_status())
            .finish_non_exhaustive()
    }
}
