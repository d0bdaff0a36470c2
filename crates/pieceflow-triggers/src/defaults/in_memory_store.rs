//! In-memory trigger store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::traits::TriggerStore;

/// Per-scope state: maps key → value.
type ScopeState = HashMap<String, Value>;

/// In-memory trigger store backed by a `HashMap` protected by `RwLock`.
///
/// State is keyed by `(scope, key)`. Nothing survives a restart.
pub struct InMemoryTriggerStore {
    state: RwLock<HashMap<String, ScopeState>>,
}

impl InMemoryTriggerStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Copy of every key held for `scope`.
    pub async fn snapshot(&self, scope: &str) -> HashMap<String, Value> {
        let guard = self.state.read().await;
        guard.get(scope).cloned().unwrap_or_default()
    }
}

impl Default for InMemoryTriggerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerStore for InMemoryTriggerStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.state.read().await;
        Ok(guard.get(scope).and_then(|s| s.get(key)).cloned())
    }

    async fn put(&self, scope: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        guard
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, scope: &str, key: &str) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        if let Some(s) = guard.get_mut(scope) {
            s.remove(key);
            if s.is_empty() {
                guard.remove(scope);
            }
        }
        Ok(())
    }
}
