//! Webhook signature verification
//!
//! The provider signs each webhook with HMAC-SHA1 over the full callback
//! URL followed by the POST parameters sorted by key, each appended as
//! `key` then `value` with no separator. The digest arrives base64-encoded
//! in the `X-Twilio-Signature` header.

use base64::{engine::general_purpose::STANDARD, Engine};
use calldesk_core::{AppError, AppResult};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;
use tracing::warn;

type HmacSha1 = Hmac<Sha1>;

/// Verifier for provider webhook signatures, keyed per request by the
/// owning account's auth token.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Compute the expected signature for a callback URL and its sorted
    /// form parameters.
    pub fn compute(
        &self,
        auth_token: &str,
        url: &str,
        params: &BTreeMap<String, String>,
    ) -> AppResult<String> {
        let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
            .map_err(|e| AppError::Internal(format!("hmac key setup failed: {}", e)))?;

        mac.update(url.as_bytes());
        // BTreeMap iteration order is the sorted key order the scheme requires.
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Verify a received signature. Comparison runs on the raw digest via
    /// the Mac so it is constant time.
    pub fn verify(
        &self,
        auth_token: &str,
        url: &str,
        params: &BTreeMap<String, String>,
        provided: &str,
    ) -> AppResult<()> {
        let provided_digest = STANDARD
            .decode(provided.trim())
            .map_err(|_| AppError::InvalidSignature)?;

        let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
            .map_err(|e| AppError::Internal(format!("hmac key setup failed: {}", e)))?;

        mac.update(url.as_bytes());
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }

        mac.verify_slice(&provided_digest).map_err(|_| {
            warn!(url = %url, "Webhook signature mismatch");
            AppError::InvalidSignature
        })
    }
}

/// Parse a raw `application/x-www-form-urlencoded` body into sorted
/// key/value pairs. Percent-decoding happens here, once, so the same map
/// feeds both signature verification and payload extraction.
pub fn parse_form_body(body: &[u8]) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
