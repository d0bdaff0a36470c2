//! Trigger event types handed to the host engine.

use serde::{Deserialize, Serialize};

/// One emitted event, addressed to the flow that owns the trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggerEvent {
    pub flow_id: String,
    pub trigger_id: String,
    pub payload: serde_json::Value,
    pub source: TriggerSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// How an event was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
#[non_exhaustive]
pub enum TriggerSource {
    /// Inbound delivery for a registered webhook.
    Webhook {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        webhook_id: Option<String>,
    },
    /// One item found by a polling run.
    Poll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
    },
}
