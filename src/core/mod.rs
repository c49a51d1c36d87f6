pub mod agent;
pub mod executor;
pub mod isolation;
pub mod memory;
pub mod planner;
pub mod plugins;
pub mod proposals;
pub mod runtime_service;

pub use agent::{AgentConfig, AgentDeps, AgentRuntime, RunSummary, StopReason};
pub use executor::{Executor, HandlerExecutor, StepExecutionResult, StepHandler};
pub use memory::{InMemoryStore, MemoryStore};
pub use planner::{MissionContext, PlannedAction, Planner, QueuePlanner, Step, StepStatus};
pub use plugins::{PluginFault, PluginHost, RuntimePlugin};
pub use proposals::{
    AutoDecision, DuplicatePolicy, InMemoryProposalStore, Proposal, ProposalDecision,
    ProposalStatus, ProposalStore, ProposalStoreOptions,
};
pub use runtime_service::{RuntimeService, RuntimeStatus};
