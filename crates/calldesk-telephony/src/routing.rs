//! Routing decisions for call-initiation events
//!
//! Pure: the engine turns a resolved identity plus the counterpart into a
//! `Directive` value and never touches the store. Encoding to provider
//! markup lives in `twiml`.

use crate::identity::{Identity, ResolvedIdentity};
use calldesk_core::{config::TelephonyConfig, AppError, AppResult, models::CallReceivingDevice};
use uuid::Uuid;

/// What the provider should announce when an incoming call has no
/// routable target.
const UNAVAILABLE_MESSAGE: &str =
    "The person you are trying to reach is currently unavailable. Please try again later.";

/// Recording behavior requested in a dial directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    RecordFromAnswerDual,
    DoNotRecord,
}

impl RecordingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingMode::RecordFromAnswerDual => "record-from-answer-dual",
            RecordingMode::DoNotRecord => "do-not-record",
        }
    }

    fn from_preference(record_calls: bool) -> Self {
        if record_calls {
            RecordingMode::RecordFromAnswerDual
        } else {
            RecordingMode::DoNotRecord
        }
    }
}

/// Leg the dial connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    Number(String),
    Client(Uuid),
}

/// A dial instruction with its status-callback wiring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialDirective {
    pub caller_id: String,
    pub record: RecordingMode,
    pub target: DialTarget,
    /// Absolute URL the provider posts status events to
    pub status_callback: String,
}

/// Declarative call-control response for the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Dial(DialDirective),
    Say { message: String },
}

/// Stateless decision engine over the telephony configuration
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    config: TelephonyConfig,
}

impl RoutingEngine {
    pub fn new(config: TelephonyConfig) -> Self {
        Self { config }
    }

    /// Route an outgoing call placed from the agent's software client.
    ///
    /// The agent's assigned provider number is the caller id shown to the
    /// counterpart; without one the call cannot present a valid origin.
    pub fn route_outgoing(
        &self,
        resolved: &ResolvedIdentity,
        counterpart: &Identity,
    ) -> AppResult<Directive> {
        let caller_id = resolved
            .agent
            .agent_number
            .clone()
            .ok_or(AppError::ConfigurationIncomplete("agent_number"))?;

        let target = match counterpart {
            Identity::PhoneNumber(number) => DialTarget::Number(number.clone()),
            Identity::Client(user_id) => DialTarget::Client(*user_id),
        };

        Ok(Directive::Dial(DialDirective {
            caller_id,
            record: RecordingMode::from_preference(resolved.agent.credentials.record_calls),
            target,
            status_callback: self.config.callback_url("update-outgoing-call-status"),
        }))
    }

    /// Route an incoming call to the agent who owns the dialed number.
    /// Without a routable target the announcement plays and the call runs
    /// its course unanswered; the missed-call side effects derive from the
    /// terminal status event, not from the routing decision.
    pub fn route_incoming(&self, resolved: &ResolvedIdentity, caller_number: &str) -> Directive {
        if resolved.agent.lacks_phone_target() {
            return Directive::Say {
                message: UNAVAILABLE_MESSAGE.to_string(),
            };
        }

        let target = match resolved.agent.call_receiving_device {
            CallReceivingDevice::Phone => {
                // lacks_phone_target() above guarantees the number is set.
                DialTarget::Number(resolved.agent.phone.clone().unwrap_or_default())
            }
            CallReceivingDevice::Client => DialTarget::Client(resolved.agent.user_id),
        };

        Directive::Dial(DialDirective {
            caller_id: caller_number.to_string(),
            record: RecordingMode::from_preference(resolved.agent.credentials.record_calls),
            target,
            status_callback: self.config.callback_url("update-incoming-call-status"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calldesk_core::models::{AgentProfile, ProviderCredentials};

    fn resolved(device: CallReceivingDevice, phone: Option<&str>, record: bool) -> ResolvedIdentity {
        ResolvedIdentity {
            identity: Identity::PhoneNumber("+15550001111".to_string()),
            agent: AgentProfile {
                user_id: Uuid::parse_str("9f3c1a26-0000-4000-8000-1234567890ab").unwrap(),
                organization_id: 7,
                phone: phone.map(str::to_string),
                agent_number: Some("+15550001111".to_string()),
                call_receiving_device: device,
                credentials: ProviderCredentials {
                    record_calls: record,
                    ..Default::default()
                },
            },
        }
    }

    fn engine() -> RoutingEngine {
        RoutingEngine::new(TelephonyConfig {
            base_url: "https://crm.example.com".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_outgoing_to_number_uses_agent_number_as_caller_id() {
        let directive = engine()
            .route_outgoing(
                &resolved(CallReceivingDevice::Client, None, true),
                &Identity::PhoneNumber("+15559998888".to_string()),
            )
            .unwrap();

        match directive {
            Directive::Dial(dial) => {
                assert_eq!(dial.caller_id, "+15550001111");
                assert_eq!(dial.target, DialTarget::Number("+15559998888".to_string()));
                assert_eq!(dial.record, RecordingMode::RecordFromAnswerDual);
                assert_eq!(
                    dial.status_callback,
                    "https://crm.example.com/webhooks/telephony/update-outgoing-call-status"
                );
            }
            other => panic!("expected Dial, got {:?}", other),
        }
    }

    #[test]
    fn test_outgoing_without_agent_number_is_incomplete() {
        let mut identity = resolved(CallReceivingDevice::Client, None, false);
        identity.agent.agent_number = None;

        let result = engine().route_outgoing(
            &identity,
            &Identity::PhoneNumber("+15559998888".to_string()),
        );
        assert!(matches!(
            result,
            Err(AppError::ConfigurationIncomplete("agent_number"))
        ));
    }

    #[test]
    fn test_incoming_to_phone_device() {
        let directive = engine().route_incoming(
            &resolved(CallReceivingDevice::Phone, Some("+15552223333"), false),
            "+15559998888",
        );

        match directive {
            Directive::Dial(dial) => {
                assert_eq!(dial.caller_id, "+15559998888");
                assert_eq!(dial.target, DialTarget::Number("+15552223333".to_string()));
                assert_eq!(dial.record, RecordingMode::DoNotRecord);
                assert_eq!(
                    dial.status_callback,
                    "https://crm.example.com/webhooks/telephony/update-incoming-call-status"
                );
            }
            other => panic!("expected Dial, got {:?}", other),
        }
    }

    #[test]
    fn test_incoming_to_client_device() {
        let identity = resolved(CallReceivingDevice::Client, None, false);
        let directive = engine().route_incoming(&identity, "+15559998888");

        match directive {
            Directive::Dial(dial) => {
                assert_eq!(dial.target, DialTarget::Client(identity.agent.user_id));
            }
            other => panic!("expected Dial, got {:?}", other),
        }
    }

    #[test]
    fn test_incoming_without_target_announces() {
        let directive = engine().route_incoming(
            &resolved(CallReceivingDevice::Phone, None, false),
            "+15559998888",
        );

        assert!(matches!(directive, Directive::Say { .. }));
    }
}
