//! Connection settings passed to every vendor adapter at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PieceConfigError {
    #[error("missing config value: {key}")]
    Missing { key: String },
    #[error("invalid piece config: {message}")]
    Invalid { message: String },
}

/// How requests authenticate against the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum PieceAuth {
    /// `Authorization: Bearer {token}`.
    Bearer { token: String },
    /// An arbitrary header, e.g. `X-Api-Key`.
    Header { name: String, value: String },
}

/// Base URL, credentials and timeout for one vendor connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceConfig {
    pub base_url: String,
    pub auth: PieceAuth,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl PieceConfig {
    /// Bearer-token config. Trailing slashes on `base_url` are dropped.
    pub fn bearer(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            auth: PieceAuth::Bearer {
                token: token.into(),
            },
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_header_auth(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = PieceAuth::Header {
            name: name.into(),
            value: value.into(),
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parse from a JSON config block.
    ///
    /// Shape: `{ "base_url": "...", "auth": { "type": "bearer", "token": "..." } }`
    pub fn from_value(value: &Value) -> Result<Self, PieceConfigError> {
        let mut config: Self =
            serde_json::from_value(value.clone()).map_err(|e| PieceConfigError::Invalid {
                message: e.to_string(),
            })?;
        config.base_url = trim_base(config.base_url);
        config.validate()?;
        Ok(config)
    }

    /// Read `{PREFIX}_BASE_URL` and `{PREFIX}_TOKEN` (bearer auth), falling
    /// back to `default_base_url` when the URL variable is unset.
    pub fn from_env(prefix: &str, default_base_url: &str) -> Result<Self, PieceConfigError> {
        Self::from_lookup(prefix, default_base_url, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        prefix: &str,
        default_base_url: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PieceConfigError> {
        let token_key = format!("{prefix}_TOKEN");
        let token = lookup(&token_key).ok_or(PieceConfigError::Missing { key: token_key })?;
        let base_url = lookup(&format!("{prefix}_BASE_URL"))
            .unwrap_or_else(|| default_base_url.to_string());
        let config = Self::bearer(base_url, token);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PieceConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(PieceConfigError::Invalid {
                message: format!("base_url must be http(s): {}", self.base_url),
            });
        }
        let secret = match &self.auth {
            PieceAuth::Bearer { token } => token,
            PieceAuth::Header { value, .. } => value,
        };
        if secret.trim().is_empty() {
            return Err(PieceConfigError::Missing {
                key: "auth".into(),
            });
        }
        Ok(())
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
