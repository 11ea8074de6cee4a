//! Webhook payload DTOs
//!
//! The provider posts form-encoded bodies with PascalCase field names. The
//! raw body is parsed once into sorted key/value pairs (signature
//! verification needs the exact parameter set); these DTOs are then shaped
//! from that map, so unknown parameters are simply ignored.

use calldesk_core::{
    models::{CallDirection, CallStatus},
    AppError, AppResult,
};
use calldesk_telephony::CallEvent;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use validator::Validate;

/// Shape a typed DTO out of the parsed form parameters.
pub fn shape<T: DeserializeOwned + Validate>(params: &BTreeMap<String, String>) -> AppResult<T> {
    let value = serde_json::to_value(params)?;
    let dto: T = serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("malformed webhook payload: {}", e)))?;
    dto.validate()?;
    Ok(dto)
}

/// Outgoing call initiation, posted by the provider when the softphone
/// places a call through the TwiML application.
///
/// The CRM correlation fields are custom parameters the softphone attaches
/// to the connect request; the provider passes them through verbatim.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceWebhook {
    #[validate(length(min = 1))]
    pub call_sid: String,
    /// Initiating identity, a `client:` tag for softphone calls
    #[validate(length(min = 1))]
    pub from: String,
    /// Dialed counterpart
    #[validate(length(min = 1))]
    pub to: String,

    #[serde(default, rename = "contact_id")]
    pub contact_id: Option<String>,
    #[serde(default, rename = "lead_id")]
    pub lead_id: Option<String>,
    #[serde(default, rename = "opportunity_id")]
    pub opportunity_id: Option<String>,
}

impl VoiceWebhook {
    pub fn contact_id(&self) -> Option<i64> {
        self.contact_id.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn lead_id(&self) -> Option<i64> {
        self.lead_id.as_deref().and_then(|v| v.parse().ok())
    }

    pub fn opportunity_id(&self) -> Option<i64> {
        self.opportunity_id.as_deref().and_then(|v| v.parse().ok())
    }
}

/// Inbound call to an agent's provider number
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct IncomingCallWebhook {
    #[validate(length(min = 1))]
    pub call_sid: String,
    /// Caller's number
    #[validate(length(min = 1))]
    pub from: String,
    /// The dialed agent number, which resolves the owning identity
    #[validate(length(min = 1))]
    pub to: String,
}

/// Status-update callback for either call direction
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CallStatusUpdate {
    #[validate(length(min = 1))]
    pub call_sid: String,
    #[serde(default)]
    pub parent_call_sid: Option<String>,
    #[validate(length(min = 1))]
    pub call_status: String,
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub called: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// Seconds, present on completion callbacks
    #[serde(default)]
    pub call_duration: Option<String>,
    /// Present only once recording completes
    #[serde(default)]
    pub recording_url: Option<String>,
}

impl CallStatusUpdate {
    /// Identity candidates in resolution order: client tags are checked
    /// across all positions before agent-number matches.
    pub fn identity_fields(&self) -> [Option<&str>; 4] {
        [
            self.caller.as_deref(),
            self.from.as_deref(),
            self.to.as_deref(),
            self.called.as_deref(),
        ]
    }

    /// Validate into a lifecycle event. An unknown status is a malformed
    /// payload; nothing gets persisted for it.
    pub fn into_event(self) -> AppResult<CallEvent> {
        let status: CallStatus = self
            .call_status
            .parse()
            .map_err(|e: String| AppError::Validation(e))?;

        Ok(CallEvent {
            call_sid: self.call_sid,
            parent_call_sid: self.parent_call_sid.filter(|s| !s.is_empty()),
            status,
            caller: self.caller,
            called: self.called,
            from_number: self.from,
            to_number: self.to,
            duration: self.call_duration.as_deref().and_then(|d| d.parse().ok()),
            recording_url: self.recording_url,
        })
    }
}

/// Direction a status webhook route is bound to
#[derive(Debug, Clone, Copy)]
pub enum StatusRoute {
    Outgoing,
    Incoming,
}

impl StatusRoute {
    pub fn direction(&self) -> CallDirection {
        match self {
            StatusRoute::Outgoing => CallDirection::Outgoing,
            StatusRoute::Incoming => CallDirection::Incoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_voice_webhook_shaping() {
        let dto: VoiceWebhook = shape(&params(&[
            ("CallSid", "CA1"),
            ("From", "client:9f3c1a26-0000-4000-8000-1234567890ab"),
            ("To", "+15559998888"),
            ("contact_id", "5"),
            ("AccountSid", "AC1"),
        ]))
        .unwrap();

        assert_eq!(dto.call_sid, "CA1");
        assert_eq!(dto.contact_id(), Some(5));
        assert!(dto.lead_id().is_none());
    }

    #[test]
    fn test_missing_required_field_is_validation_error() {
        let result: AppResult<VoiceWebhook> =
            shape(&params(&[("CallSid", "CA1"), ("From", "client:x")]));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_status_update_into_event() {
        let dto: CallStatusUpdate = shape(&params(&[
            ("CallSid", "CAchild"),
            ("ParentCallSid", "CAparent"),
            ("CallStatus", "completed"),
            ("CallDuration", "42"),
            ("To", "+15559998888"),
        ]))
        .unwrap();

        let event = dto.into_event().unwrap();
        assert_eq!(event.record_sid(), "CAparent");
        assert_eq!(event.duration, Some(42));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let dto: CallStatusUpdate = shape(&params(&[
            ("CallSid", "CA1"),
            ("CallStatus", "vaporized"),
        ]))
        .unwrap();
        assert!(matches!(dto.into_event(), Err(AppError::Validation(_))));
    }
}
