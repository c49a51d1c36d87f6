use claw_runtime::core::{
    AgentConfig, AgentDeps, AgentRuntime, HandlerExecutor, PlannedAction, PluginHost,
    ProposalStore, QueuePlanner,
};
use claw_runtime::ports::ControlPlanePort;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// Executor whose `echo` action records every payload it runs.
pub fn recording_executor() -> (HandlerExecutor, Arc<Mutex<Vec<Value>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);
    let mut executor = HandlerExecutor::new();
    executor.register("echo", move |payload: Value| {
        seen.lock().unwrap().push(payload.clone());
        async move { Ok(json!({ "echoed": payload })) }
    });
    (executor, calls)
}

pub fn echo_steps(count: usize) -> QueuePlanner {
    QueuePlanner::new((1..=count).map(|n| PlannedAction::new("echo", json!({ "n": n }))))
}

pub struct MissionBuilder {
    mission_id: String,
    max_steps: u32,
    steps: usize,
    plugins: Option<Arc<PluginHost>>,
    proposals: Option<Arc<dyn ProposalStore>>,
}

impl MissionBuilder {
    pub fn new(mission_id: &str, steps: usize) -> Self {
        Self {
            mission_id: mission_id.to_string(),
            max_steps: 50,
            steps,
            plugins: None,
            proposals: None,
        }
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn plugins(mut self, plugins: Arc<PluginHost>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn proposals(mut self, store: Arc<dyn ProposalStore>) -> Self {
        self.proposals = Some(store);
        self
    }

    pub fn build(
        self,
        control_plane: Arc<dyn ControlPlanePort>,
    ) -> (AgentRuntime, Arc<Mutex<Vec<Value>>>) {
        let (executor, calls) = recording_executor();
        let agent = AgentRuntime::new(
            AgentConfig::new(self.mission_id).with_max_steps(self.max_steps),
            AgentDeps {
                planner: Arc::new(echo_steps(self.steps)),
                executor: Arc::new(executor),
                control_plane,
                plugins: self.plugins,
                proposals: self.proposals,
            },
        );
        (agent, calls)
    }
}
