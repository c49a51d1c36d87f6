use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Failed)
    }
}

/// One planned unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub action: String,
    pub payload: Value,
    pub status: StepStatus,
}

impl Step {
    pub fn pending(id: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            payload,
            status: StepStatus::Pending,
        }
    }
}

/// Read-only view handed to the planner. `history` is a copy, never the live list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionContext {
    pub mission_id: String,
    pub history: Vec<Step>,
}

/// Proposes the next step of a mission.
///
/// Returning `Ok(None)` ends the mission successfully. The rejection and
/// result hooks are optional; the defaults do nothing.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn next_step(&self, context: &MissionContext) -> anyhow::Result<Option<Step>>;

    async fn on_rejection(&self, _step: &Step, _reason: Option<&str>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_result(&self, _step: &Step) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Action template queued in a [`QueuePlanner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

impl PlannedAction {
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}

/// Planner that drains a fixed queue of actions, numbering steps
/// `step-<mission>-<n>` from 1.
#[derive(Debug)]
pub struct QueuePlanner {
    state: Mutex<QueueState>,
}

#[derive(Debug)]
struct QueueState {
    queue: VecDeque<PlannedAction>,
    counter: u64,
}

impl QueuePlanner {
    pub fn new(actions: impl IntoIterator<Item = PlannedAction>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: actions.into_iter().collect(),
                counter: 0,
            }),
        }
    }

    pub fn remaining(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .queue
            .len()
    }
}

#[async_trait]
impl Planner for QueuePlanner {
    async fn next_step(&self, context: &MissionContext) -> anyhow::Result<Option<Step>> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(next) = state.queue.pop_front() else {
            return Ok(None);
        };
        state.counter += 1;
        Ok(Some(Step::pending(
            format!("step-{}-{}", context.mission_id, state.counter),
            next.action,
            next.payload,
        )))
    }

    async fn on_rejection(&self, step: &Step, reason: Option<&str>) -> anyhow::Result<()> {
        // Rejected steps are dropped; no re-planning.
        tracing::debug!(step_id = %step.id, reason = ?reason, "queue planner dropping rejected step");
        Ok(())
    }
}
