//! Built-in plugins selectable by name from config.

pub mod audit_log;

use crate::core::plugins::{PluginHost, RuntimePlugin};
use crate::error::ConfigError;
use std::sync::Arc;

pub use audit_log::AuditLogPlugin;

pub const BUILTIN_PLUGINS: &[&str] = &[audit_log::NAME];

pub fn builtin(name: &str) -> Option<Arc<dyn RuntimePlugin>> {
    match name {
        audit_log::NAME => Some(Arc::new(AuditLogPlugin)),
        _ => None,
    }
}

/// Register each named built-in on `host`, in the given order.
pub fn register_enabled(host: &PluginHost, names: &[String]) -> Result<(), ConfigError> {
    for name in names {
        let plugin = builtin(name)
            .ok_or_else(|| ConfigError::Validation(format!("unknown plugin '{name}'")))?;
        host.register(plugin);
        tracing::debug!(plugin = %name, "plugin registered");
    }
    Ok(())
}
