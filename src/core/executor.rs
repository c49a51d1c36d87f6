use super::planner::Step;
use async_trait::async_trait;
use super::isolation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Body of one action. Any `Fn(Value) -> impl Future<Output = anyhow::Result<Value>>`
/// closure is a handler.
pub trait StepHandler: Send + Sync {
    fn call(&self, payload: Value) -> HandlerFuture;
}

impl<F, Fut> StepHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn call(&self, payload: Value) -> HandlerFuture {
        Box::pin(self(payload))
    }
}

/// Result of executing one approved step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepExecutionResult {
    pub fn ok(step_id: impl Into<String>, output: Value) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Runs approved steps.
///
/// A conforming executor encodes every failure in the returned result and
/// never returns `Err`. The agent loop treats `Err` as fatal.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, step: &Step) -> anyhow::Result<StepExecutionResult>;
}

/// Executor backed by a map of action name to handler.
#[derive(Default)]
pub struct HandlerExecutor {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to an action. Replaces any existing handler for the same action.
    pub fn register(&mut self, action: impl Into<String>, handler: impl StepHandler + 'static) {
        self.handlers.insert(action.into(), Arc::new(handler));
    }

    pub fn has_handler(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Sorted list of registered action names.
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl Executor for HandlerExecutor {
    async fn execute(&self, step: &Step) -> anyhow::Result<StepExecutionResult> {
        let Some(handler) = self.handlers.get(&step.action) else {
            return Ok(StepExecutionResult::failed(
                &step.id,
                format!("No handler registered for action: {}", step.action),
            ));
        };

        let outcome = isolation::catch_future(handler.call(step.payload.clone())).await;

        Ok(match outcome {
            Ok(Ok(output)) => StepExecutionResult::ok(&step.id, output),
            Ok(Err(error)) => StepExecutionResult::failed(&step.id, error.to_string()),
            Err(_) => StepExecutionResult::failed(&step.id, "Unknown error"),
        })
    }
}
