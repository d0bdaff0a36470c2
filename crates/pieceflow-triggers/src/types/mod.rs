//! Foundational types for the trigger lifecycle.
//!
//! The persisted shapes ([`SubscriptionRecord`], [`PollingCursor`]) keep the
//! camelCase key layout the host store has always used, so records written
//! by older pieces still deserialize.

pub mod triggers;

pub use triggers::*;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Lifecycle state
// ---------------------------------------------------------------------------

/// Lifecycle state of a single trigger instance.
///
/// `Disabled → Enabling → Enabled → Disabling → Disabled`. A failed enable
/// falls back to `Disabled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    #[default]
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Enabling => "enabling",
            Self::Enabled => "enabled",
            Self::Disabling => "disabling",
        };
        f.write_str(s)
    }
}

/// Whether a trigger observes events by webhook delivery or by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Webhook,
    Polling,
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// Local reference to a remotely registered webhook.
///
/// Owned by exactly one enabled trigger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub webhook_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// High-water mark used to filter already-seen polled items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PollingCursor {
    LastItem {
        #[serde(rename = "lastItemId")]
        last_item_id: String,
    },
    Time {
        #[serde(rename = "lastFetchEpochMilliseconds")]
        last_fetch_epoch_milliseconds: i64,
    },
}

impl PollingCursor {
    pub fn last_item(id: impl Into<String>) -> Self {
        Self::LastItem {
            last_item_id: id.into(),
        }
    }

    pub fn time(epoch_ms: i64) -> Self {
        Self::Time {
            last_fetch_epoch_milliseconds: epoch_ms,
        }
    }

    pub fn last_item_id(&self) -> Option<&str> {
        match self {
            Self::LastItem { last_item_id } => Some(last_item_id),
            Self::Time { .. } => None,
        }
    }

    pub fn epoch_ms(&self) -> Option<i64> {
        match self {
            Self::Time {
                last_fetch_epoch_milliseconds,
            } => Some(*last_fetch_epoch_milliseconds),
            Self::LastItem { .. } => None,
        }
    }
}

/// Rule used to avoid re-emitting already-seen polled items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeStrategy {
    /// Stop at the first item whose id equals the stored cursor id.
    LastItem,
    /// Keep items strictly newer than the stored epoch milliseconds.
    TimeBased,
}

// ---------------------------------------------------------------------------
// Boundary values
// ---------------------------------------------------------------------------

/// One item produced by a polling source, already validated into the
/// fields the dedupe step needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolledItem {
    pub id: String,
    pub created_at_ms: i64,
    /// The event forwarded downstream.
    pub data: Value,
}

impl PolledItem {
    pub fn new(id: impl Into<String>, created_at_ms: i64, data: Value) -> Self {
        Self {
            id: id.into(),
            created_at_ms,
            data,
        }
    }
}

/// A raw inbound webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Exact bytes received on the wire. Signatures are computed over these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<Vec<u8>>,
}

impl WebhookPayload {
    /// Payload with an already-parsed body and no raw bytes.
    pub fn new(body: Value) -> Self {
        Self {
            headers: BTreeMap::new(),
            body,
            raw_body: None,
        }
    }

    /// Build a payload from the bytes received on the wire. Non-JSON bodies
    /// are kept as a string value.
    pub fn from_raw(headers: BTreeMap<String, String>, raw: Vec<u8>) -> Self {
        let body = serde_json::from_slice(&raw)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&raw).into_owned()));
        Self {
            headers,
            body,
            raw_body: Some(raw),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The bytes a signature covers: the raw body when present, otherwise
    /// the compact serialization of `body`.
    pub fn signed_bytes(&self) -> Cow<'_, [u8]> {
        match &self.raw_body {
            Some(raw) => Cow::Borrowed(raw.as_slice()),
            None => Cow::Owned(serde_json::to_vec(&self.body).unwrap_or_default()),
        }
    }
}

/// Result of disabling a trigger. Disabling never fails because of the
/// vendor; remote cleanup problems are reported here instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableOutcome {
    /// Nothing was registered remotely.
    NoSubscription,
    /// The remote webhook was deleted and the local record cleared.
    Removed { webhook_id: String },
    /// The remote delete failed; the local record was cleared anyway.
    RemovedLocally { webhook_id: String, warning: String },
}

/// A single `{label, value}` entry served by an
/// [`OptionsProvider`](crate::traits::OptionsProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub label: String,
    pub value: Value,
}

impl DropdownOption {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}
