//! Runtime context given to every trigger invocation.
//!
//! The host constructs a [`TriggerCtx`] per call to `on_enable`,
//! `on_disable`, `run` or `test`. Trigger code reaches persisted state only
//! through the [`StoreHandle`] it carries.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::errors::{StoreError, TriggerError};
use super::traits::TriggerStore;
use super::types::WebhookPayload;

// ---------------------------------------------------------------------------
// StoreHandle
// ---------------------------------------------------------------------------

/// A [`TriggerStore`] bound to one trigger instance's scope.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn TriggerStore>,
    scope: String,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn TriggerStore>, scope: impl Into<String>) -> Self {
        Self {
            store,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.store.get(&self.scope, key).await
    }

    pub async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.store.put(&self.scope, key, value).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(&self.scope, key).await
    }

    /// Read and deserialize a typed value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Malformed {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Serialize and write a typed value.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Malformed {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.put(key, value).await
    }
}

// ---------------------------------------------------------------------------
// TriggerCtx
// ---------------------------------------------------------------------------

/// The runtime context given to every trigger invocation.
#[derive(Clone)]
pub struct TriggerCtx {
    trigger_id: String,
    store: StoreHandle,
    webhook_url: Option<String>,
    payload: Option<WebhookPayload>,
}

impl TriggerCtx {
    pub fn new(trigger_id: impl Into<String>, store: StoreHandle) -> Self {
        Self {
            trigger_id: trigger_id.into(),
            store,
            webhook_url: None,
            payload: None,
        }
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn with_payload(mut self, payload: WebhookPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// The callback URL, or a config error when the host provided none.
    pub fn require_webhook_url(&self) -> Result<&str, TriggerError> {
        self.webhook_url().ok_or_else(|| TriggerError::Config {
            message: format!("trigger '{}' has no webhook url", self.trigger_id),
        })
    }

    pub fn payload(&self) -> Option<&WebhookPayload> {
        self.payload.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Test utilities for building [`TriggerCtx`] instances.
    //!
    //! ```ignore
    //! let (ctx, store) = TestTriggerCtx::builder()
    //!     .webhook_url("https://hooks.test/abc")
    //!     .build();
    //!
    //! trigger.on_enable(&ctx).await?;
    //! assert!(store.get(ctx.store().scope(), "webhook").await?.is_some());
    //! ```

    use std::sync::Arc;

    use crate::defaults::InMemoryTriggerStore;
    use crate::types::WebhookPayload;

    use super::{StoreHandle, TriggerCtx};

    /// Builder for a [`TriggerCtx`] backed by a fresh in-memory store.
    pub struct TestTriggerCtx {
        trigger_id: String,
        store: Option<Arc<InMemoryTriggerStore>>,
        webhook_url: Option<String>,
        payload: Option<WebhookPayload>,
    }

    impl TestTriggerCtx {
        pub fn builder() -> Self {
            Self {
                trigger_id: "test-trigger".into(),
                store: None,
                webhook_url: None,
                payload: None,
            }
        }

        pub fn trigger_id(mut self, id: impl Into<String>) -> Self {
            self.trigger_id = id.into();
            self
        }

        /// Share a store across several contexts, e.g. enable then run.
        pub fn store(mut self, store: Arc<InMemoryTriggerStore>) -> Self {
            self.store = Some(store);
            self
        }

        pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
            self.webhook_url = Some(url.into());
            self
        }

        pub fn payload(mut self, payload: WebhookPayload) -> Self {
            self.payload = Some(payload);
            self
        }

        pub fn build(self) -> (TriggerCtx, Arc<InMemoryTriggerStore>) {
            let store = self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryTriggerStore::new()));
            let handle = StoreHandle::new(store.clone(), format!("test-flow/{}", self.trigger_id));
            let mut ctx = TriggerCtx::new(self.trigger_id, handle);
            if let Some(url) = self.webhook_url {
                ctx = ctx.with_webhook_url(url);
            }
            if let Some(payload) = self.payload {
                ctx = ctx.with_payload(payload);
            }
            (ctx, store)
        }
    }
}
