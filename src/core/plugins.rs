use super::executor::StepExecutionResult;
use super::planner::Step;
use super::isolation;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

pub type HookFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

const ANONYMOUS_PLUGIN: &str = "anonymous-plugin";

#[derive(Debug, Clone, Copy)]
pub struct ToolCallContext<'a> {
    pub step: &'a Step,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolResultContext<'a> {
    pub step: &'a Step,
    pub result: &'a StepExecutionResult,
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryWriteContext<'a> {
    pub location: &'a str,
    pub content: &'a Value,
}

/// Observer of agent loop lifecycle events.
///
/// Every hook is optional: the default returns `None`, meaning the plugin
/// does not implement it and is skipped for that event. A plugin that
/// overrides none of them is legal and never invoked.
pub trait RuntimePlugin: Send + Sync {
    fn name(&self) -> Option<&str> {
        None
    }

    /// Dispatch position; lower runs first, ties run in registration order.
    fn order(&self) -> i32 {
        0
    }

    fn before_tool_call<'a>(&'a self, _ctx: &'a ToolCallContext<'a>) -> Option<HookFuture<'a>> {
        None
    }

    fn after_tool_call<'a>(&'a self, _ctx: &'a ToolResultContext<'a>) -> Option<HookFuture<'a>> {
        None
    }

    fn on_memory_write<'a>(&'a self, _ctx: &'a MemoryWriteContext<'a>) -> Option<HookFuture<'a>> {
        None
    }

    fn on_runtime_error<'a>(&'a self, _error: &'a anyhow::Error) -> Option<HookFuture<'a>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Hook {
    #[strum(serialize = "beforeToolCall")]
    BeforeToolCall,
    #[strum(serialize = "afterToolCall")]
    AfterToolCall,
    #[strum(serialize = "onMemoryWrite")]
    OnMemoryWrite,
    #[strum(serialize = "onRuntimeError")]
    OnRuntimeError,
}

/// One isolated hook failure, tagged `plugin-name:hook-name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginFault {
    pub plugin: String,
    pub message: String,
}

struct Registration {
    plugin: Arc<dyn RuntimePlugin>,
    order: i32,
    sequence: u64,
}

#[derive(Default)]
struct Registry {
    entries: Vec<Registration>,
    next_sequence: u64,
}

/// Ordered plugin dispatcher.
///
/// Hooks run one at a time in ascending `(order, sequence)` order. A hook
/// that errors or panics is logged and skipped; dispatch always continues and
/// nothing propagates to the caller.
#[derive(Default)]
pub struct PluginHost {
    registry: RwLock<Registry>,
    faults: Mutex<Vec<PluginFault>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: Arc<dyn RuntimePlugin>) {
        let order = plugin.order();
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let sequence = registry.next_sequence;
        registry.next_sequence += 1;

        let position = registry
            .entries
            .partition_point(|entry| (entry.order, entry.sequence) < (order, sequence));
        registry.entries.insert(
            position,
            Registration {
                plugin,
                order,
                sequence,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.read_registry().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in dispatch order, for diagnostics.
    pub fn plugin_names(&self) -> Vec<String> {
        self.read_registry()
            .entries
            .iter()
            .map(|entry| display_name(entry.plugin.as_ref()).to_string())
            .collect()
    }

    /// Snapshot of recorded hook failures.
    pub fn errors(&self) -> Vec<PluginFault> {
        self.faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub async fn emit_before_tool(&self, step: &Step) {
        let ctx = ToolCallContext { step };
        for plugin in self.snapshot() {
            let started = isolation::catch(|| plugin.before_tool_call(&ctx));
            self.settle(plugin.as_ref(), Hook::BeforeToolCall, started)
                .await;
        }
    }

    pub async fn emit_after_tool(&self, step: &Step, result: &StepExecutionResult) {
        let ctx = ToolResultContext { step, result };
        for plugin in self.snapshot() {
            let started = isolation::catch(|| plugin.after_tool_call(&ctx));
            self.settle(plugin.as_ref(), Hook::AfterToolCall, started)
                .await;
        }
    }

    pub async fn emit_memory_write(&self, location: &str, content: &Value) {
        let ctx = MemoryWriteContext { location, content };
        for plugin in self.snapshot() {
            let started = isolation::catch(|| plugin.on_memory_write(&ctx));
            self.settle(plugin.as_ref(), Hook::OnMemoryWrite, started)
                .await;
        }
    }

    pub async fn emit_runtime_error(&self, error: &anyhow::Error) {
        for plugin in self.snapshot() {
            let started = isolation::catch(|| plugin.on_runtime_error(error));
            self.settle(plugin.as_ref(), Hook::OnRuntimeError, started)
                .await;
        }
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // Cloned so no lock is held while hooks run.
    fn snapshot(&self) -> Vec<Arc<dyn RuntimePlugin>> {
        self.read_registry()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.plugin))
            .collect()
    }

    async fn settle(
        &self,
        plugin: &dyn RuntimePlugin,
        hook: Hook,
        started: std::thread::Result<Option<HookFuture<'_>>>,
    ) {
        let message = match started {
            Ok(None) => return,
            Err(panic) => panic_message(panic.as_ref()),
            Ok(Some(future)) => match isolation::catch_future(future).await {
                Ok(Ok(())) => return,
                Ok(Err(error)) => error.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            },
        };

        let tag = format!("{}:{hook}", display_name(plugin));
        tracing::warn!(plugin = %tag, error = %message, "plugin hook failed; continuing dispatch");
        self.faults
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(PluginFault { plugin: tag, message });
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugins", &self.plugin_names())
            .field("faults", &self.errors().len())
            .finish()
    }
}

fn display_name(plugin: &dyn RuntimePlugin) -> &str {
    plugin
        .name()
        .filter(|name| !name.is_empty())
        .unwrap_or(ANONYMOUS_PLUGIN)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown error".to_string())
}
