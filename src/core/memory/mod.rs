//! Key/value mission memory.

use crate::core::plugins::PluginHost;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value);

    /// All entries, ordered by key.
    fn entries(&self) -> Vec<(String, Value)>;

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local memory. When bound to a [`PluginHost`], every `set`
/// emits `onMemoryWrite` after the value is stored.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
    plugins: Option<Arc<PluginHost>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugins(plugins: Arc<PluginHost>) -> Self {
        Self {
            entries: RwLock::default(),
            plugins: Some(plugins),
        }
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entries", &self.len())
            .field("observed", &self.plugins.is_some())
            .finish()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.clone());

        if let Some(plugins) = &self.plugins {
            plugins.emit_memory_write(key, &value).await;
        }
    }

    fn entries(&self) -> Vec<(String, Value)> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
