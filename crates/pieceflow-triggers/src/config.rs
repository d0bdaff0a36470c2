//! Configuration for the trigger controllers.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::triggers::EventFilter;

/// Page sizes used by [`PollingTrigger`](crate::triggers::PollingTrigger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Items fetched on each `run`.
    pub page_size: usize,
    /// Items fetched by `on_enable` to seed the cursor.
    pub seed_page_size: usize,
    /// Items returned by `test`.
    pub sample_size: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            seed_page_size: 1,
            sample_size: 5,
        }
    }
}

impl PollingConfig {
    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n;
        self
    }

    pub fn seed_page_size(mut self, n: usize) -> Self {
        self.seed_page_size = n;
        self
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.sample_size = n;
        self
    }
}

/// Settings for [`WebhookTrigger`](crate::triggers::WebhookTrigger).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookTriggerConfig {
    /// Vendor event types passed to the "create webhook" call.
    pub events: Vec<String>,
    /// Drop events that do not match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<EventFilter>,
    /// Check delivery signatures when the vendor signs and a secret is stored.
    pub verify_signatures: bool,
}

impl Default for WebhookTriggerConfig {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            filter: None,
            verify_signatures: true,
        }
    }
}

impl WebhookTriggerConfig {
    pub fn event(mut self, event_type: impl Into<String>) -> Self {
        self.events.push(event_type.into());
        self
    }

    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn verify_signatures(mut self, verify: bool) -> Self {
        self.verify_signatures = verify;
        self
    }
}
