//! Plugin trait interfaces for the trigger lifecycle.
//!
//! Every seam is an async trait. The host engine supplies a
//! [`TriggerStore`]; each piece supplies a [`WebhookVendor`] or a
//! [`PollingSource`]; the controllers in [`crate::triggers`] combine them
//! into a [`Trigger`].

use async_trait::async_trait;
use serde_json::Value;

use super::errors::*;
use super::trigger_ctx::TriggerCtx;
use super::triggers::SignatureScheme;
use super::types::*;

// ---------------------------------------------------------------------------
// TriggerStore
// ---------------------------------------------------------------------------

/// Scoped key-value persistence owned by the host engine.
///
/// `scope` identifies one trigger instance; its lifetime is bound to the
/// instance's enabled lifespan. Deleting a missing key is not an error.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, scope: &str, key: &str, value: Value) -> Result<(), StoreError>;

    async fn delete(&self, scope: &str, key: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// WebhookVendor
// ---------------------------------------------------------------------------

/// What a vendor returned when asked to create a webhook.
///
/// `id` stays optional so the controller, not each vendor, decides that a
/// missing id is a registration failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookRegistration {
    pub id: Option<String>,
    pub secret: Option<String>,
}

/// A vendor API able to register and delete webhook subscriptions.
#[async_trait]
pub trait WebhookVendor: Send + Sync {
    /// Vendor name for diagnostics.
    fn name(&self) -> &str;

    /// Call the vendor's "create webhook" endpoint.
    async fn subscribe(
        &self,
        target_url: &str,
        events: &[String],
    ) -> Result<WebhookRegistration, TriggerError>;

    /// Call the vendor's "delete webhook" endpoint for a stored record.
    ///
    /// `target_url` is the callback URL the record was registered with, for
    /// vendors that delete by destination rather than by id.
    async fn unsubscribe(
        &self,
        record: &SubscriptionRecord,
        target_url: Option<&str>,
    ) -> Result<(), TriggerError>;

    /// How deliveries are signed. `None` disables verification.
    fn signature_scheme(&self) -> Option<SignatureScheme> {
        None
    }

    /// Split one delivery body into independent events.
    ///
    /// The default emits the body itself. Vendors that group several
    /// changes into one delivery override this.
    fn events(&self, body: &Value) -> Vec<Value> {
        vec![body.clone()]
    }

    /// Canned delivery body used by `test()` when no sample payload is given.
    fn sample(&self) -> Value {
        Value::Null
    }
}

// ---------------------------------------------------------------------------
// PollingSource
// ---------------------------------------------------------------------------

/// Parameters for one page fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub limit: usize,
    /// The stored cursor, for vendors able to filter server-side.
    pub cursor: Option<&'a PollingCursor>,
}

/// A vendor endpoint listing items newest-first.
#[async_trait]
pub trait PollingSource: Send + Sync {
    /// Source name for diagnostics.
    fn name(&self) -> &str;

    fn strategy(&self) -> DedupeStrategy;

    /// Fetch one page, newest item first.
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<Vec<PolledItem>, TriggerError>;
}

// ---------------------------------------------------------------------------
// OptionsProvider
// ---------------------------------------------------------------------------

/// Fetch-on-demand dropdown data for trigger properties.
#[async_trait]
pub trait OptionsProvider: Send + Sync {
    async fn options(&self, context: &Value) -> Result<Vec<DropdownOption>, TriggerError>;
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// An event produced by a trigger run, before the runner addresses it to a
/// flow.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub payload: Value,
    pub source: TriggerSource,
}

/// The lifecycle every trigger implements.
///
/// Each call is one short-lived invocation scheduled by the host. The host
/// guarantees that at most one invocation per instance runs at a time.
#[async_trait]
pub trait Trigger: Send + Sync {
    fn trigger_type(&self) -> &str;

    fn kind(&self) -> TriggerKind;

    /// Begin observing. Must not emit events.
    async fn on_enable(&self, ctx: &TriggerCtx) -> Result<(), TriggerError>;

    /// Stop observing. Vendor failures are reported in the outcome, never
    /// as an error.
    async fn on_disable(&self, ctx: &TriggerCtx) -> Result<DisableOutcome, TriggerError>;

    /// Produce new events.
    async fn run(&self, ctx: &TriggerCtx) -> Result<Vec<EmittedEvent>, TriggerError>;

    /// Preview sample output without mutating stored state.
    async fn test(&self, ctx: &TriggerCtx) -> Result<Vec<Value>, TriggerError>;
}
