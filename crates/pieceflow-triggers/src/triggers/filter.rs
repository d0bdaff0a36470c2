//! Property-based suppression of webhook events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keeps only events whose property at `path` equals `equals`.
///
/// `path` is dot-separated (`status_id`, `data.record.status`). Numbers and
/// numeric strings compare equal, since form-encoded deliveries carry every
/// scalar as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub path: String,
    pub equals: Value,
}

impl EventFilter {
    pub fn new(path: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            equals: equals.into(),
        }
    }

    pub fn matches(&self, event: &Value) -> bool {
        let found = self
            .path
            .split('.')
            .try_fold(event, |value, segment| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            });
        match found {
            Some(actual) => loosely_equal(actual, &self.equals),
            None => false,
        }
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
