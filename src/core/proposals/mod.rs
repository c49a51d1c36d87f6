//! Approval-tracking records for proposed steps.
//!
//! [`InMemoryProposalStore`] bridges an external, possibly delayed decision
//! (admin API call, timeout) into the agent loop: the loop parks in
//! [`ProposalStore::await_decision`] on a one-shot channel keyed by proposal
//! id, and the first terminal transition for that id completes it.
//!
//! Every transition (check pending, set terminal, resolve waiter, cancel
//! timer) happens under one lock, so manual approve, manual reject and the
//! timeout are mutually exclusive and at most one of them wins.

use crate::error::ProposalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub mission_id: String,
    pub action: String,
    pub payload: Value,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
}

impl Proposal {
    /// The decision this record resolves to, or `None` while pending.
    pub fn decision(&self) -> Option<ProposalDecision> {
        match self.status {
            ProposalStatus::Pending => None,
            ProposalStatus::Approved => Some(ProposalDecision {
                approved: true,
                reason: self.decision_reason.clone(),
            }),
            ProposalStatus::Rejected => Some(ProposalDecision {
                approved: false,
                reason: self.decision_reason.clone(),
            }),
            ProposalStatus::Expired => Some(ProposalDecision {
                approved: false,
                reason: Some(
                    self.decision_reason
                        .clone()
                        .unwrap_or_else(|| EXPIRED_REASON.to_string()),
                ),
            }),
        }
    }
}

/// Fields supplied by the caller of [`ProposalStore::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    pub id: String,
    pub mission_id: String,
    pub action: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDecision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Terminal transition applied when a proposal outlives its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoDecision {
    Approve,
    Reject,
}

/// What `create` does when the id is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with [`ProposalError::Conflict`].
    #[default]
    Reject,
    /// Replace the record and re-arm its timeout. An outstanding waiter stays
    /// registered and receives the replacement's decision.
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalStoreOptions {
    pub timeout: Option<Duration>,
    pub auto_decision: Option<AutoDecision>,
    pub duplicate_policy: DuplicatePolicy,
}

pub const AUTO_APPROVED_REASON: &str = "auto-approved";
pub const AUTO_REJECTED_REASON: &str = "auto-rejected";
pub const EXPIRED_REASON: &str = "expired";

#[async_trait]
pub trait ProposalStore: Send + Sync {
    fn create(&self, spec: NewProposal) -> Result<Proposal, ProposalError>;

    /// All proposals in creation order.
    fn list(&self) -> Vec<Proposal>;

    fn get(&self, id: &str) -> Option<Proposal>;

    /// Returns `None` for an unknown id; a no-op returning the existing
    /// record once the proposal is terminal.
    fn approve(&self, id: &str) -> Option<Proposal>;

    /// Same contract as [`ProposalStore::approve`].
    fn reject(&self, id: &str, reason: Option<String>) -> Option<Proposal>;

    /// Resolves immediately for a terminal proposal, otherwise parks until
    /// the first approve, reject or timeout.
    async fn await_decision(&self, id: &str) -> Result<ProposalDecision, ProposalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    Manual,
    /// Carries the generation of the timer that fired.
    Timeout(u64),
}

struct ArmedTimer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct StoreState {
    proposals: HashMap<String, Proposal>,
    order: Vec<String>,
    waiters: HashMap<String, oneshot::Sender<ProposalDecision>>,
    timers: HashMap<String, ArmedTimer>,
    next_generation: u64,
}

struct Shared {
    options: ProposalStoreOptions,
    state: Mutex<StoreState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn transition(
        &self,
        id: &str,
        status: ProposalStatus,
        reason: Option<String>,
        cause: Cause,
    ) -> Option<Proposal> {
        let mut state = self.lock();
        if let Cause::Timeout(generation) = cause
            && state.timers.get(id).map(|timer| timer.generation) != Some(generation)
        {
            // Cancelled or re-armed since this timer was spawned.
            return None;
        }

        let proposal = state.proposals.get_mut(id)?;
        if proposal.status != ProposalStatus::Pending {
            return Some(proposal.clone());
        }

        proposal.status = status;
        proposal.decided_at = Some(Utc::now());
        proposal.decision_reason = reason;
        let record = proposal.clone();

        if let Some(waiter) = state.waiters.remove(id)
            && let Some(decision) = record.decision()
        {
            // The waiter may have given up; nothing left to notify then.
            let _ = waiter.send(decision);
        }

        if let Some(timer) = state.timers.remove(id)
            && cause == Cause::Manual
        {
            timer.handle.abort();
        }

        Some(record)
    }

    fn on_timeout(&self, id: &str, generation: u64) {
        let (status, reason) = match self.options.auto_decision {
            Some(AutoDecision::Approve) => (ProposalStatus::Approved, AUTO_APPROVED_REASON),
            Some(AutoDecision::Reject) => (ProposalStatus::Rejected, AUTO_REJECTED_REASON),
            None => (ProposalStatus::Expired, EXPIRED_REASON),
        };
        if let Some(record) =
            self.transition(id, status, Some(reason.to_string()), Cause::Timeout(generation))
            && record.status == status
        {
            tracing::warn!(
                proposal_id = %id,
                status = %record.status,
                reason = %reason,
                "proposal auto-resolved after timeout"
            );
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
    }
}

/// Process-local [`ProposalStore`]. Dropping it cancels every armed timer.
pub struct InMemoryProposalStore {
    shared: Arc<Shared>,
}

impl InMemoryProposalStore {
    pub fn new(options: ProposalStoreOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    pub fn options(&self) -> &ProposalStoreOptions {
        &self.shared.options
    }

    /// Number of timeouts currently armed.
    pub fn armed_timers(&self) -> usize {
        self.shared.lock().timers.len()
    }

    fn arm_timeout(
        &self,
        state: &mut StoreState,
        id: &str,
        runtime: Option<&tokio::runtime::Handle>,
    ) {
        let (Some(timeout), Some(runtime)) = (self.shared.options.timeout, runtime) else {
            return;
        };

        let generation = state.next_generation;
        state.next_generation += 1;

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let timer_id = id.to_string();
        let task = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = shared.upgrade() {
                shared.on_timeout(&timer_id, generation);
            }
        });

        state.timers.insert(
            id.to_string(),
            ArmedTimer {
                generation,
                handle: task.abort_handle(),
            },
        );
    }
}

impl Default for InMemoryProposalStore {
    fn default() -> Self {
        Self::new(ProposalStoreOptions::default())
    }
}

impl std::fmt::Debug for InMemoryProposalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("InMemoryProposalStore")
            .field("options", &self.shared.options)
            .field("proposals", &state.proposals.len())
            .field("waiters", &state.waiters.len())
            .field("timers", &state.timers.len())
            .finish()
    }
}

#[async_trait]
impl ProposalStore for InMemoryProposalStore {
    fn create(&self, spec: NewProposal) -> Result<Proposal, ProposalError> {
        let runtime = match self.shared.options.timeout {
            Some(_) => Some(
                tokio::runtime::Handle::try_current()
                    .map_err(|_| ProposalError::TimerUnavailable)?,
            ),
            None => None,
        };

        let mut state = self.shared.lock();
        if state.proposals.contains_key(&spec.id) {
            match self.shared.options.duplicate_policy {
                DuplicatePolicy::Reject => {
                    return Err(ProposalError::Conflict { id: spec.id });
                }
                DuplicatePolicy::Overwrite => {
                    if let Some(timer) = state.timers.remove(&spec.id) {
                        timer.handle.abort();
                    }
                    tracing::debug!(proposal_id = %spec.id, "overwriting existing proposal");
                }
            }
        } else {
            state.order.push(spec.id.clone());
        }

        let record = Proposal {
            id: spec.id,
            mission_id: spec.mission_id,
            action: spec.action,
            payload: spec.payload,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
            decision_reason: None,
        };
        state.proposals.insert(record.id.clone(), record.clone());
        self.arm_timeout(&mut state, &record.id, runtime.as_ref());

        tracing::debug!(proposal_id = %record.id, action = %record.action, "proposal created");
        Ok(record)
    }

    fn list(&self) -> Vec<Proposal> {
        let state = self.shared.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.proposals.get(id).cloned())
            .collect()
    }

    fn get(&self, id: &str) -> Option<Proposal> {
        self.shared.lock().proposals.get(id).cloned()
    }

    fn approve(&self, id: &str) -> Option<Proposal> {
        let record = self
            .shared
            .transition(id, ProposalStatus::Approved, None, Cause::Manual);
        if let Some(record) = &record {
            tracing::info!(proposal_id = %id, status = %record.status, "approve requested");
        }
        record
    }

    fn reject(&self, id: &str, reason: Option<String>) -> Option<Proposal> {
        let record = self
            .shared
            .transition(id, ProposalStatus::Rejected, reason, Cause::Manual);
        if let Some(record) = &record {
            tracing::info!(proposal_id = %id, status = %record.status, "reject requested");
        }
        record
    }

    async fn await_decision(&self, id: &str) -> Result<ProposalDecision, ProposalError> {
        let receiver = {
            let mut state = self.shared.lock();
            let Some(proposal) = state.proposals.get(id) else {
                return Err(ProposalError::NotFound { id: id.to_string() });
            };
            if let Some(decision) = proposal.decision() {
                return Ok(decision);
            }

            // One waiter per id; a newer wait replaces (and drops) an older one.
            let (sender, receiver) = oneshot::channel();
            state.waiters.insert(id.to_string(), sender);
            receiver
        };

        receiver
            .await
            .map_err(|_| ProposalError::WaiterDropped { id: id.to_string() })
    }
}
