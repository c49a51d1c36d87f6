use crate::support::MissionBuilder;
use claw_runtime::adapters::MockControlPlane;
use claw_runtime::core::plugins::{HookFuture, MemoryWriteContext, ToolCallContext};
use claw_runtime::core::{InMemoryStore, MemoryStore, PluginHost, RuntimePlugin};
use serde_json::json;
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    order: i32,
    journal: Journal,
}

impl RuntimePlugin for Recorder {
    fn name(&self) -> Option<&str> {
        Some(self.name)
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn before_tool_call<'a>(&'a self, ctx: &'a ToolCallContext<'a>) -> Option<HookFuture<'a>> {
        Some(Box::pin(async move {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, ctx.step.id));
            Ok(())
        }))
    }

    fn on_memory_write<'a>(&'a self, ctx: &'a MemoryWriteContext<'a>) -> Option<HookFuture<'a>> {
        Some(Box::pin(async move {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:write:{}", self.name, ctx.location));
            Ok(())
        }))
    }
}

struct Failing;

impl RuntimePlugin for Failing {
    fn name(&self) -> Option<&str> {
        Some("failing")
    }

    fn before_tool_call<'a>(&'a self, _ctx: &'a ToolCallContext<'a>) -> Option<HookFuture<'a>> {
        Some(Box::pin(async { anyhow::bail!("hook exploded") }))
    }
}

struct Panicking;

impl RuntimePlugin for Panicking {
    fn before_tool_call<'a>(&'a self, _ctx: &'a ToolCallContext<'a>) -> Option<HookFuture<'a>> {
        panic!("hook panicked before returning a future")
    }
}

fn recorder(name: &'static str, order: i32, journal: &Journal) -> Arc<dyn RuntimePlugin> {
    Arc::new(Recorder {
        name,
        order,
        journal: Arc::clone(journal),
    })
}

#[tokio::test]
async fn faulty_plugins_never_break_the_mission() {
    let journal: Journal = Arc::default();
    let host = Arc::new(PluginHost::new());
    host.register(recorder("late", 10, &journal));
    host.register(Arc::new(Failing));
    host.register(Arc::new(Panicking));
    host.register(recorder("early", -5, &journal));

    let (agent, calls) = MissionBuilder::new("plugins", 2)
        .plugins(Arc::clone(&host))
        .build(Arc::new(MockControlPlane::new()));
    let summary = agent.run().await.unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert_eq!(
        *journal.lock().unwrap(),
        vec![
            "early:step-plugins-1",
            "late:step-plugins-1",
            "early:step-plugins-2",
            "late:step-plugins-2",
        ]
    );

    let faults = host.errors();
    assert_eq!(faults.len(), 4);
    assert_eq!(faults[0].plugin, "failing:beforeToolCall");
    assert!(faults[0].message.contains("hook exploded"));
    assert_eq!(faults[1].plugin, "anonymous-plugin:beforeToolCall");
    assert!(faults[1].message.contains("panicked"));
}

#[tokio::test]
async fn memory_writes_reach_plugins_in_order() {
    let journal: Journal = Arc::default();
    let host = Arc::new(PluginHost::new());
    host.register(recorder("second", 2, &journal));
    host.register(recorder("first", 1, &journal));

    let memory = InMemoryStore::with_plugins(Arc::clone(&host));
    memory.set("last_log", json!("hello")).await;

    assert_eq!(memory.get("last_log"), Some(json!("hello")));
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["first:write:last_log", "second:write:last_log"]
    );
    assert!(host.errors().is_empty());
}
