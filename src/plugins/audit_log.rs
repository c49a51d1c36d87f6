use crate::core::plugins::{
    HookFuture, MemoryWriteContext, RuntimePlugin, ToolCallContext, ToolResultContext,
};

pub const NAME: &str = "audit-log";

/// Traces every lifecycle event under the `audit` target.
#[derive(Debug, Default)]
pub struct AuditLogPlugin;

impl RuntimePlugin for AuditLogPlugin {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }

    // Runs after any plugin at the default order so it sees their effects.
    fn order(&self) -> i32 {
        100
    }

    fn before_tool_call<'a>(&'a self, ctx: &'a ToolCallContext<'a>) -> Option<HookFuture<'a>> {
        Some(Box::pin(async move {
            tracing::info!(
                target: "audit",
                step_id = %ctx.step.id,
                action = %ctx.step.action,
                "step starting"
            );
            Ok(())
        }))
    }

    fn after_tool_call<'a>(&'a self, ctx: &'a ToolResultContext<'a>) -> Option<HookFuture<'a>> {
        Some(Box::pin(async move {
            tracing::info!(
                target: "audit",
                step_id = %ctx.step.id,
                action = %ctx.step.action,
                success = ctx.result.success,
                error = ?ctx.result.error,
                "step finished"
            );
            Ok(())
        }))
    }

    fn on_memory_write<'a>(&'a self, ctx: &'a MemoryWriteContext<'a>) -> Option<HookFuture<'a>> {
        Some(Box::pin(async move {
            tracing::info!(target: "audit", location = %ctx.location, "memory write");
            Ok(())
        }))
    }

    fn on_runtime_error<'a>(&'a self, error: &'a anyhow::Error) -> Option<HookFuture<'a>> {
        Some(Box::pin(async move {
            tracing::error!(target: "audit", error = %error, "runtime error");
            Ok(())
        }))
    }
}
