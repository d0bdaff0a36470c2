//! Error types for trigger lifecycle operations.

use thiserror::Error;

use crate::types::TriggerState;

/// Errors from [`TriggerStore`](super::traits::TriggerStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trigger store error: {message}")]
    Store { message: String },
    #[error("stored value under '{key}' is malformed: {message}")]
    Malformed { key: String, message: String },
}

/// Errors surfaced by trigger controllers, vendors and the runner.
///
/// Transport failures are passed through untouched so the host engine can
/// apply its own retry policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TriggerError {
    /// Webhook creation returned no usable subscription id.
    #[error("webhook registration failed: {message}")]
    Registration { message: String },
    /// Network, auth or rate-limit failure from a vendor call.
    #[error("vendor request failed{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },
    /// A vendor response could not be decoded into its typed model.
    #[error("failed to decode vendor response: {message}")]
    Decode { message: String },
    #[error("trigger config error: {message}")]
    Config { message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The instance already holds a subscription record.
    #[error("trigger '{trigger_id}' is already enabled")]
    AlreadyEnabled { trigger_id: String },
    #[error("trigger '{trigger_id}' is {actual}, expected {expected}")]
    InvalidState {
        trigger_id: String,
        expected: TriggerState,
        actual: TriggerState,
    },
    #[error("unknown trigger instance: {trigger_id}")]
    UnknownInstance { trigger_id: String },
    #[error("trigger event channel closed")]
    ChannelClosed,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl TriggerError {
    /// Build a transport error from an HTTP status and response text.
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Whether the host engine may reasonably retry the invocation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status: None, .. } => true,
            Self::Transport {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_includes_status() {
        let err = TriggerError::transport(Some(401), "invalid token");
        assert_eq!(
            err.to_string(),
            "vendor request failed (HTTP 401): invalid token"
        );

        let err = TriggerError::transport(None, "connection reset");
        assert_eq!(err.to_string(), "vendor request failed: connection reset");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TriggerError::transport(None, "timeout").is_retryable());
        assert!(TriggerError::transport(Some(503), "unavailable").is_retryable());
        assert!(TriggerError::transport(Some(429), "slow down").is_retryable());
        assert!(!TriggerError::transport(Some(403), "forbidden").is_retryable());
        assert!(!TriggerError::Registration {
            message: "no id".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = TriggerError::InvalidState {
            trigger_id: "t-1".into(),
            expected: TriggerState::Disabled,
            actual: TriggerState::Enabled,
        };
        assert_eq!(err.to_string(), "trigger 't-1' is enabled, expected disabled");
    }
}
