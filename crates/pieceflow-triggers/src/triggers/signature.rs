//! HMAC-SHA256 verification of inbound webhook deliveries.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::types::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

/// How the digest is written into the signature header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureEncoding {
    #[default]
    Hex,
    Base64,
}

/// Where a vendor puts its delivery signature and how it is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureScheme {
    /// Header carrying the signature, matched case-insensitively.
    pub header: String,
    /// Literal prefix before the digest, e.g. `sha256=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub encoding: SignatureEncoding,
}

/// Why a delivery failed verification. Never surfaced to the host: the
/// controller drops the delivery instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header '{header}'")]
    MissingHeader { header: String },
    #[error("malformed signature: {message}")]
    Malformed { message: String },
    #[error("signature mismatch")]
    Mismatch,
}

impl SignatureScheme {
    /// Hex digest in `header`, no prefix.
    pub fn hex(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            prefix: None,
            encoding: SignatureEncoding::Hex,
        }
    }

    /// Base64 digest in `header`, no prefix.
    pub fn base64(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            prefix: None,
            encoding: SignatureEncoding::Base64,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Header value a sender would attach for `body`.
    pub fn sign(&self, secret: &str, body: &[u8]) -> String {
        let mut mac = new_mac(secret);
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        let encoded = match self.encoding {
            SignatureEncoding::Hex => hex::encode(digest),
            SignatureEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(digest),
        };
        format!("{}{encoded}", self.prefix.as_deref().unwrap_or_default())
    }

    /// Check the payload's signature header against `secret`.
    ///
    /// The digest comparison is constant-time.
    pub fn verify(&self, secret: &str, payload: &WebhookPayload) -> Result<(), SignatureError> {
        let value = payload
            .header(&self.header)
            .ok_or_else(|| SignatureError::MissingHeader {
                header: self.header.clone(),
            })?
            .trim();

        let digest = match &self.prefix {
            Some(prefix) => value
                .strip_prefix(prefix.as_str())
                .ok_or_else(|| SignatureError::Malformed {
                    message: format!("expected prefix '{prefix}'"),
                })?,
            None => value,
        };

        let expected = match self.encoding {
            SignatureEncoding::Hex => hex::decode(digest).map_err(|e| SignatureError::Malformed {
                message: e.to_string(),
            })?,
            SignatureEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(digest)
                .map_err(|e| SignatureError::Malformed {
                    message: e.to_string(),
                })?,
        };

        let mut mac = new_mac(secret);
        mac.update(&payload.signed_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

fn new_mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any size"))
}
