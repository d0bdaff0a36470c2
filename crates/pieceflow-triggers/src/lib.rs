//! The trigger lifecycle shared by every integration
//! piece.
//!
//! A piece observes a third-party service either through a webhook it
//! registers on enable and deletes on disable, or by polling a listing
//! endpoint and filtering out items it has already seen. This crate holds
//! that protocol: the persisted record shapes, the store abstraction, both
//! controllers, signature verification, and a runner that walks instances
//! through their state machine.
//!
//! The crate performs no HTTP itself. Vendor calls go through the
//! [`WebhookVendor`] and [`PollingSource`] traits, implemented per piece.

pub mod config;
pub mod defaults;
pub mod errors;
pub mod traits;
pub mod trigger_ctx;
pub mod triggers;
pub mod types;

// Re-export public types at the crate level.

// config
pub use config::{PollingConfig, WebhookTriggerConfig};

// defaults
pub use defaults::{FileTriggerStore, InMemoryTriggerStore};

// errors
pub use errors::{StoreError, TriggerError};

// trigger_ctx
#[cfg(any(test, feature = "test-support"))]
pub use trigger_ctx::test_support::TestTriggerCtx;
pub use trigger_ctx::{StoreHandle, TriggerCtx};

// traits
pub use traits::{
    EmittedEvent, FetchRequest, OptionsProvider, PollingSource, Trigger, TriggerStore,
    WebhookRegistration, WebhookVendor,
};

// triggers
pub use triggers::{
    EventFilter, PollingTrigger, SignatureEncoding, SignatureError, SignatureScheme,
    TriggerInstance, TriggerRunner, WebhookTrigger, CURSOR_KEY, SUBSCRIPTION_KEY,
};

// types
pub use types::{
    DedupeStrategy, DisableOutcome, DropdownOption, PolledItem, PollingCursor,
    SubscriptionRecord, TriggerEvent, TriggerKind, TriggerSource, TriggerState, WebhookPayload,
};
