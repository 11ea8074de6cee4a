//! Telephony provider REST client
//!
//! Two operations reach the provider after a call exists: fetching the
//! authoritative call details for enrichment, and relaying a mid-call
//! application message to the parent leg. Credentials are passed per
//! request since each webhook resolves to its own owning account.

use async_trait::async_trait;
use calldesk_core::{
    models::{CallDetailsPatch, ProviderCredentials},
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Authoritative call metadata fetched from the provider
#[derive(Debug, Clone, Default)]
pub struct CallDetails {
    pub duration: Option<i32>,
    pub price: Option<Decimal>,
    pub price_unit: Option<String>,
    pub recording_url: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<CallDetails> for CallDetailsPatch {
    fn from(details: CallDetails) -> Self {
        CallDetailsPatch {
            duration: details.duration,
            price: details.price,
            price_unit: details.price_unit,
            recording_url: details.recording_url,
            start_time: details.start_time,
            end_time: details.end_time,
            ..Default::default()
        }
    }
}

/// Async boundary to the provider's REST API
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetch the call resource for enrichment once a call is reportable.
    async fn fetch_call_details(
        &self,
        credentials: &ProviderCredentials,
        call_sid: &str,
    ) -> AppResult<CallDetails>;

    /// Relay an application-level message to a live call leg.
    async fn send_mid_call_message(
        &self,
        credentials: &ProviderCredentials,
        call_sid: &str,
        payload: &serde_json::Value,
    ) -> AppResult<()>;
}

/// REST client against the Twilio-compatible API
pub struct TwilioClient {
    http: reqwest::Client,
    base: String,
}

/// Call resource as the provider serializes it. Numeric fields arrive as
/// strings and may be null mid-call, so everything parses leniently.
#[derive(Debug, Deserialize)]
struct CallResource {
    duration: Option<String>,
    price: Option<String>,
    price_unit: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    recording_url: Option<String>,
}

impl TwilioClient {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        Self::with_base(timeout, API_BASE)
    }

    pub fn with_base(timeout: Duration, base: impl Into<String>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("http client setup failed: {}", e)))?;
        Ok(Self {
            http,
            base: base.into(),
        })
    }

    fn unavailable(context: &str, e: impl std::fmt::Display) -> AppError {
        AppError::ProviderUnavailable(format!("{}: {}", context, e))
    }
}

/// Provider timestamps use RFC 2822 ("Tue, 31 Aug 2021 20:36:28 +0000").
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<CallResource> for CallDetails {
    fn from(resource: CallResource) -> Self {
        CallDetails {
            duration: resource.duration.as_deref().and_then(|d| d.parse().ok()),
            price: resource
                .price
                .as_deref()
                .and_then(|p| Decimal::from_str(p).ok()),
            price_unit: resource.price_unit,
            recording_url: resource.recording_url,
            start_time: resource.start_time.as_deref().and_then(parse_timestamp),
            end_time: resource.end_time.as_deref().and_then(parse_timestamp),
        }
    }
}

#[async_trait]
impl ProviderClient for TwilioClient {
    #[instrument(skip(self, credentials))]
    async fn fetch_call_details(
        &self,
        credentials: &ProviderCredentials,
        call_sid: &str,
    ) -> AppResult<CallDetails> {
        let (account_sid, auth_token) = credentials.require_rest()?;
        let url = format!(
            "{}/Accounts/{}/Calls/{}.json",
            self.base, account_sid, call_sid
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(account_sid, Some(auth_token))
            .send()
            .await
            .map_err(|e| Self::unavailable("call details request failed", e))?;

        if !response.status().is_success() {
            warn!(call_sid = %call_sid, status = %response.status(), "Call details fetch rejected");
            return Err(AppError::ProviderUnavailable(format!(
                "call details fetch returned {}",
                response.status()
            )));
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| Self::unavailable("call details response malformed", e))?;

        let details = CallDetails::from(resource);
        debug!(call_sid = %call_sid, duration = ?details.duration, "Fetched call details");
        Ok(details)
    }

    #[instrument(skip(self, credentials, payload))]
    async fn send_mid_call_message(
        &self,
        credentials: &ProviderCredentials,
        call_sid: &str,
        payload: &serde_json::Value,
    ) -> AppResult<()> {
        let (account_sid, auth_token) = credentials.require_rest()?;
        let url = format!(
            "{}/Accounts/{}/Calls/{}/UserDefinedMessages.json",
            self.base, account_sid, call_sid
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("Content", payload.to_string())])
            .send()
            .await
            .map_err(|e| Self::unavailable("mid-call message request failed", e))?;

        if !response.status().is_success() {
            return Err(AppError::ProviderUnavailable(format!(
                "mid-call message returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_call_resource_lenient_parsing() {
        let resource = CallResource {
            duration: Some("42".to_string()),
            price: Some("-0.03000".to_string()),
            price_unit: Some("USD".to_string()),
            start_time: Some("Tue, 31 Aug 2021 20:36:28 +0000".to_string()),
            end_time: None,
            recording_url: None,
        };

        let details = CallDetails::from(resource);
        assert_eq!(details.duration, Some(42));
        assert_eq!(details.price, Some(dec!(-0.03000)));
        assert!(details.start_time.is_some());
        assert!(details.end_time.is_none());
    }

    #[test]
    fn test_unparseable_fields_become_none() {
        let resource = CallResource {
            duration: Some("n/a".to_string()),
            price: Some("free".to_string()),
            price_unit: None,
            start_time: Some("yesterday".to_string()),
            end_time: None,
            recording_url: None,
        };

        let details = CallDetails::from(resource);
        assert!(details.duration.is_none());
        assert!(details.price.is_none());
        assert!(details.start_time.is_none());
    }

    #[test]
    fn test_details_into_patch() {
        let patch: CallDetailsPatch = CallDetails {
            duration: Some(10),
            ..Default::default()
        }
        .into();
        assert_eq!(patch.duration, Some(10));
        assert!(patch.recording_url.is_none());
    }
}
