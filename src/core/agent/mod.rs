//! Step approval and execution loop.
//!
//! Each iteration asks the planner for a step, gates it through the control
//! plane (and the proposal store when one is injected), executes approved
//! steps and reports the outcome. Rejections are recorded and looped past;
//! planner, control-plane and executor errors end the run.
//!
//! Decision authority: with a proposal store the store's resolution is the
//! only decision that counts, and the direct control-plane response is logged
//! and discarded. Without a store the control-plane response decides.

use crate::core::executor::Executor;
use crate::core::planner::{MissionContext, Planner, Step, StepStatus};
use crate::core::plugins::PluginHost;
use crate::core::proposals::{NewProposal, ProposalStore};
use crate::error::AgentError;
use crate::ports::{ControlPlanePort, StepProposal, StepResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_MAX_STEPS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub mission_id: String,
    pub max_steps: u32,
}

impl AgentConfig {
    pub fn new(mission_id: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Collaborators injected into one [`AgentRuntime`].
#[derive(Clone)]
pub struct AgentDeps {
    pub planner: Arc<dyn Planner>,
    pub executor: Arc<dyn Executor>,
    pub control_plane: Arc<dyn ControlPlanePort>,
    pub plugins: Option<Arc<PluginHost>>,
    pub proposals: Option<Arc<dyn ProposalStore>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    /// The planner returned no further step.
    PlannerExhausted,
    /// `max_steps` iterations ran.
    MaxSteps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: u32,
    pub completed: u32,
    pub failed: u32,
    pub rejected: u32,
    pub stop_reason: StopReason,
}

struct Decision {
    approved: bool,
    reason: Option<String>,
}

pub struct AgentRuntime {
    config: AgentConfig,
    deps: AgentDeps,
    history: Mutex<Vec<Step>>,
}

impl AgentRuntime {
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Self {
        Self {
            config,
            deps,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn mission_id(&self) -> &str {
        &self.config.mission_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Snapshot of every step that reached a terminal status, in order.
    pub fn history(&self) -> Vec<Step> {
        self.lock_history().clone()
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<Step>> {
        self.history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, step: Step) {
        self.lock_history().push(step);
    }

    pub async fn run(&self) -> Result<RunSummary, AgentError> {
        let mission_id = self.config.mission_id.as_str();
        tracing::info!(mission_id, max_steps = self.config.max_steps, "mission started");

        let mut summary = RunSummary {
            steps: 0,
            completed: 0,
            failed: 0,
            rejected: 0,
            stop_reason: StopReason::MaxSteps,
        };

        while summary.steps < self.config.max_steps {
            let context = MissionContext {
                mission_id: mission_id.to_string(),
                history: self.history(),
            };
            let next = self
                .deps
                .planner
                .next_step(&context)
                .await
                .map_err(|e| AgentError::Planner(format!("{e:#}")))?;
            let Some(mut step) = next else {
                summary.stop_reason = StopReason::PlannerExhausted;
                break;
            };
            summary.steps += 1;
            tracing::debug!(mission_id, step_id = %step.id, action = %step.action, "step planned");

            let decision = self.decide(&step).await?;
            if !decision.approved {
                tracing::warn!(
                    mission_id,
                    step_id = %step.id,
                    action = %step.action,
                    reason = ?decision.reason,
                    "step rejected"
                );
                step.status = StepStatus::Rejected;
                self.record(step.clone());
                summary.rejected += 1;
                self.deps
                    .planner
                    .on_rejection(&step, decision.reason.as_deref())
                    .await
                    .map_err(|e| AgentError::Planner(format!("{e:#}")))?;
                continue;
            }

            step.status = StepStatus::Approved;
            tracing::info!(mission_id, step_id = %step.id, action = %step.action, "step approved");
            self.execute_and_report(&mut step).await?;

            if step.status == StepStatus::Completed {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
            self.record(step.clone());
            self.deps
                .planner
                .on_result(&step)
                .await
                .map_err(|e| AgentError::Planner(format!("{e:#}")))?;
        }

        tracing::info!(
            mission_id,
            steps = summary.steps,
            completed = summary.completed,
            failed = summary.failed,
            rejected = summary.rejected,
            stop_reason = %summary.stop_reason,
            "mission finished"
        );
        Ok(summary)
    }

    async fn decide(&self, step: &Step) -> Result<Decision, AgentError> {
        let mission_id = self.config.mission_id.as_str();

        if let Some(store) = &self.deps.proposals {
            store.create(NewProposal {
                id: step.id.clone(),
                mission_id: mission_id.to_string(),
                action: step.action.clone(),
                payload: step.payload.clone(),
            })?;
        }

        let proposal = StepProposal {
            mission_id: mission_id.to_string(),
            step_id: step.id.clone(),
            action: step.action.clone(),
            payload: step.payload.clone(),
        };
        let direct = match self.deps.control_plane.propose_step(&proposal).await {
            Ok(direct) => direct,
            Err(error) => {
                let message = format!("{error:#}");
                // Nothing will await this record, so it must not stay pending.
                if let Some(store) = &self.deps.proposals {
                    store.reject(&step.id, Some(format!("control plane error: {message}")));
                }
                return Err(AgentError::ControlPlane(message));
            }
        };

        let Some(store) = &self.deps.proposals else {
            return Ok(Decision {
                approved: direct.approved,
                reason: direct.reason,
            });
        };

        tracing::debug!(
            mission_id,
            step_id = %step.id,
            control_plane_approved = direct.approved,
            "awaiting proposal decision"
        );
        let resolved = store.await_decision(&step.id).await?;
        Ok(Decision {
            approved: resolved.approved,
            reason: resolved.reason,
        })
    }

    async fn execute_and_report(&self, step: &mut Step) -> Result<(), AgentError> {
        let mission_id = self.config.mission_id.as_str();

        if let Some(plugins) = &self.deps.plugins {
            plugins.emit_before_tool(step).await;
        }

        let result = match self.deps.executor.execute(step).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(mission_id, step_id = %step.id, error = %error, "executor raised");
                if let Some(plugins) = &self.deps.plugins {
                    plugins.emit_runtime_error(&error).await;
                }
                return Err(AgentError::Execution {
                    step_id: step.id.clone(),
                    message: format!("{error:#}"),
                });
            }
        };

        if let Some(plugins) = &self.deps.plugins {
            plugins.emit_after_tool(step, &result).await;
        }

        self.deps
            .control_plane
            .report_result(&StepResult {
                mission_id: mission_id.to_string(),
                step_id: step.id.clone(),
                success: result.success,
                output: result.output.clone(),
                error: result.error.clone(),
            })
            .await
            .map_err(|e| AgentError::ControlPlane(format!("{e:#}")))?;

        step.status = if result.success {
            StepStatus::Completed
        } else {
            StepStatus::Failed
        };
        tracing::debug!(mission_id, step_id = %step.id, status = %step.status, "step finished");
        Ok(())
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("config", &self.config)
            .field("history", &self.lock_history().len())
            .field("plugins", &self.deps.plugins.is_some())
            .field("proposals", &self.deps.proposals.is_some())
            .finish_non_exhaustive()
    }
}
