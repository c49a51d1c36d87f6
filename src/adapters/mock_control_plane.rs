//! In-process control plane for tests and local runs.

use crate::ports::{ControlPlaneDecision, ControlPlanePort, StepProposal, StepResult};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

type Decider = Box<dyn Fn(&StepProposal) -> ControlPlaneDecision + Send + Sync>;

/// One call observed by [`MockControlPlane`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPlaneCall {
    Propose(StepProposal),
    Report(StepResult),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockControlPlaneState {
    pub proposals: Vec<StepProposal>,
    pub results: Vec<StepResult>,
    pub calls: Vec<ControlPlaneCall>,
}

pub struct MockControlPlane {
    approve_all: bool,
    decider: Option<Decider>,
    record_history: bool,
    state: Mutex<MockControlPlaneState>,
}

impl MockControlPlane {
    /// Approves every proposal and records every call.
    pub fn new() -> Self {
        Self {
            approve_all: true,
            decider: None,
            record_history: true,
            state: Mutex::new(MockControlPlaneState::default()),
        }
    }

    /// Rejects every proposal.
    pub fn reject_all() -> Self {
        Self::new().with_approve_all(false)
    }

    pub fn with_approve_all(mut self, approve_all: bool) -> Self {
        self.approve_all = approve_all;
        self
    }

    /// Decide per proposal. Takes precedence over `approve_all`.
    pub fn with_decider(
        mut self,
        decider: impl Fn(&StepProposal) -> ControlPlaneDecision + Send + Sync + 'static,
    ) -> Self {
        self.decider = Some(Box::new(decider));
        self
    }

    pub fn with_record_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }

    /// Copy of everything recorded so far.
    pub fn state(&self) -> MockControlPlaneState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockControlPlaneState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockControlPlane")
            .field("approve_all", &self.approve_all)
            .field("decider", &self.decider.is_some())
            .field("record_history", &self.record_history)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ControlPlanePort for MockControlPlane {
    async fn propose_step(&self, proposal: &StepProposal) -> anyhow::Result<ControlPlaneDecision> {
        if self.record_history {
            let mut state = self.lock();
            state.proposals.push(proposal.clone());
            state.calls.push(ControlPlaneCall::Propose(proposal.clone()));
        }

        if let Some(decider) = &self.decider {
            return Ok(decider(proposal));
        }
        Ok(ControlPlaneDecision {
            approved: self.approve_all,
            reason: None,
        })
    }

    async fn report_result(&self, result: &StepResult) -> anyhow::Result<()> {
        if self.record_history {
            let mut state = self.lock();
            state.results.push(result.clone());
            state.calls.push(ControlPlaneCall::Report(result.clone()));
        }
        Ok(())
    }
}
