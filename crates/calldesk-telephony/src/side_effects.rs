//! Derived CRM side effects of call lifecycle transitions
//!
//! Activities, participants and inbox notifications are append-only and
//! idempotent per (call identifier, effect kind), so the engine can run on
//! every matching event. A redelivered webhook re-derives the same effects
//! and the repositories absorb the duplicates.

use calldesk_core::{
    config::TelephonyConfig,
    models::{
        ActivityKind, AgentProfile, CallDirection, CallRecord, CallStatus, NewActivity,
        NewInboxNotification, NewParticipant, ParticipantRole,
    },
    traits::{ActivityRepository, ContactRepository, InboxRepository},
    AppResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Which statuses trigger which effects. Parsed once from configuration;
/// unknown status names are dropped with a warning rather than failing
/// startup.
#[derive(Debug, Clone)]
pub struct EffectPolicy {
    notify: HashSet<CallStatus>,
    upgrade: HashSet<CallStatus>,
}

impl EffectPolicy {
    pub fn from_config(config: &TelephonyConfig) -> Self {
        Self {
            notify: parse_statuses(&config.notify_statuses, "notify_statuses"),
            upgrade: parse_statuses(&config.upgrade_statuses, "upgrade_statuses"),
        }
    }

    /// Terminal statuses that raise an inbox notification
    pub fn notifies(&self, status: CallStatus) -> bool {
        self.notify.contains(&status)
    }

    /// Statuses that upgrade an attempted/missed activity to a connected one
    pub fn upgrades(&self, status: CallStatus) -> bool {
        self.upgrade.contains(&status)
    }
}

fn parse_statuses(raw: &[String], field: &str) -> HashSet<CallStatus> {
    raw.iter()
        .filter_map(|s| match s.parse::<CallStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(field = field, value = %s, "Ignoring unknown status in effect policy");
                None
            }
        })
        .collect()
}

/// CRM correlation fields the client application attaches to an outgoing
/// call-initiation request.
#[derive(Debug, Clone, Default)]
pub struct CrmCorrelation {
    pub contact_id: Option<i64>,
    pub lead_id: Option<i64>,
    pub opportunity_id: Option<i64>,
}

/// Reacts to lifecycle transitions with idempotent CRM writes
pub struct SideEffectEngine {
    activities: Arc<dyn ActivityRepository>,
    inbox: Arc<dyn InboxRepository>,
    contacts: Arc<dyn ContactRepository>,
    policy: EffectPolicy,
}

impl SideEffectEngine {
    pub fn new(
        activities: Arc<dyn ActivityRepository>,
        inbox: Arc<dyn InboxRepository>,
        contacts: Arc<dyn ContactRepository>,
        policy: EffectPolicy,
    ) -> Self {
        Self {
            activities,
            inbox,
            contacts,
            policy,
        }
    }

    /// An outgoing call record was just created: log the attempt on the
    /// counterpart's timeline. Failure here propagates so the caller knows
    /// which half of the creation succeeded.
    #[instrument(skip(self, correlation))]
    pub async fn on_outgoing_call_created(
        &self,
        call_sid: &str,
        agent: &AgentProfile,
        correlation: &CrmCorrelation,
    ) -> AppResult<()> {
        let participants = correlation
            .contact_id
            .map(|id| vec![NewParticipant::contact(ParticipantRole::Called, id)])
            .unwrap_or_default();

        self.create_activity(
            call_sid,
            ActivityKind::AttemptedToCall,
            agent.organization_id,
            Some(agent.user_id),
            correlation.lead_id,
            correlation.opportunity_id,
            participants,
        )
        .await
    }

    /// An incoming call record was just created: if the caller's number
    /// matches a known contact, log a missed-call activity (upgraded later
    /// if the call connects) linked to the contact and any open lead.
    #[instrument(skip(self))]
    pub async fn on_incoming_call_created(
        &self,
        call_sid: &str,
        agent: &AgentProfile,
        caller_number: &str,
    ) -> AppResult<Option<i64>> {
        let contact = self
            .contacts
            .find_by_phone(agent.organization_id, caller_number)
            .await?;

        let Some(contact) = contact else {
            debug!(caller = %caller_number, "No contact match for incoming call");
            return Ok(None);
        };

        let lead = match contact.company_id {
            Some(company_id) => {
                self.contacts
                    .find_lead_for_company(agent.organization_id, company_id)
                    .await?
            }
            None => None,
        };

        self.create_activity(
            call_sid,
            ActivityKind::MissedCall,
            agent.organization_id,
            Some(agent.user_id),
            lead.map(|l| l.id),
            None,
            vec![NewParticipant::contact(ParticipantRole::Caller, contact.id)],
        )
        .await?;

        Ok(Some(contact.id))
    }

    /// A status event arrived for an existing record. Runs on every event
    /// that matches the policy, not only on actual transitions, so effects
    /// dropped by an earlier failure are re-derived from redeliveries.
    #[instrument(skip(self, record, agent), fields(call_sid = %record.call_sid))]
    pub async fn on_status_event(
        &self,
        record: &CallRecord,
        status: CallStatus,
        agent: &AgentProfile,
    ) -> AppResult<()> {
        if self.policy.upgrades(status) {
            let to = match record.direction {
                CallDirection::Outgoing => ActivityKind::Called,
                CallDirection::Incoming => ActivityKind::IncomingCall,
            };
            let upgraded = self
                .activities
                .upgrade_kind(
                    &record.call_sid,
                    &[ActivityKind::AttemptedToCall, ActivityKind::MissedCall],
                    to,
                )
                .await?;
            if upgraded > 0 {
                debug!(to = %to, "Upgraded call activity");
            }
        }

        if status.is_terminal()
            && self.policy.notifies(status)
            && record.direction == CallDirection::Incoming
            && (agent.lacks_phone_target() || status == CallStatus::NoAnswer)
        {
            let created = self
                .inbox
                .create_if_absent(&NewInboxNotification::missed_call(
                    agent.organization_id,
                    agent.user_id,
                    record.id,
                    record.from_number.clone(),
                ))
                .await?;
            if created {
                debug!(user_id = %agent.user_id, "Created missed-call notification");
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_activity(
        &self,
        call_sid: &str,
        kind: ActivityKind,
        organization_id: i64,
        user_id: Option<Uuid>,
        lead_id: Option<i64>,
        opportunity_id: Option<i64>,
        participants: Vec<NewParticipant>,
    ) -> AppResult<()> {
        let activity_id = self
            .activities
            .create_with_participants(&NewActivity {
                call_sid: call_sid.to_string(),
                kind,
                subject: kind.subject().to_string(),
                organization_id,
                user_id,
                lead_id,
                opportunity_id,
                participants,
            })
            .await?;

        debug!(activity_id, kind = %kind, "Recorded call activity");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeActivities, FakeContacts, FakeInbox};
    use calldesk_core::models::{CallReceivingDevice, Contact, ProviderCredentials};
    use chrono::Utc;

    fn agent(device: CallReceivingDevice, phone: Option<&str>) -> AgentProfile {
        AgentProfile {
            user_id: Uuid::parse_str("9f3c1a26-0000-4000-8000-1234567890ab").unwrap(),
            organization_id: 7,
            phone: phone.map(str::to_string),
            agent_number: Some("+15550001111".to_string()),
            call_receiving_device: device,
            credentials: ProviderCredentials::default(),
        }
    }

    fn record(direction: CallDirection, status: CallStatus) -> CallRecord {
        CallRecord {
            id: 42,
            call_sid: "CA1".to_string(),
            direction,
            caller: "+15559998888".to_string(),
            receiver: None,
            from_number: Some("+15559998888".to_string()),
            to_number: Some("+15550001111".to_string()),
            status,
            duration: None,
            price: None,
            price_unit: None,
            recording_url: None,
            start_time: None,
            end_time: None,
            contact_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn engine(
        activities: Arc<FakeActivities>,
        inbox: Arc<FakeInbox>,
        contacts: Arc<FakeContacts>,
    ) -> SideEffectEngine {
        SideEffectEngine::new(
            activities,
            inbox,
            contacts,
            EffectPolicy::from_config(&TelephonyConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_outgoing_creation_logs_attempt_with_contact() {
        let activities = Arc::new(FakeActivities::default());
        let eng = engine(
            activities.clone(),
            Arc::new(FakeInbox::default()),
            Arc::new(FakeContacts::default()),
        );

        eng.on_outgoing_call_created(
            "CA1",
            &agent(CallReceivingDevice::Client, None),
            &CrmCorrelation {
                contact_id: Some(5),
                lead_id: Some(9),
                opportunity_id: None,
            },
        )
        .await
        .unwrap();

        let stored = activities.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, ActivityKind::AttemptedToCall);
        assert_eq!(stored[0].lead_id, Some(9));
        assert_eq!(stored[0].participants.len(), 1);
        assert_eq!(stored[0].participants[0].contact_id, Some(5));
    }

    #[tokio::test]
    async fn test_incoming_creation_requires_contact_match() {
        let activities = Arc::new(FakeActivities::default());
        let contacts = Arc::new(FakeContacts::default());
        contacts.insert(Contact {
            id: 5,
            organization_id: 7,
            company_id: None,
            mobile_phone: Some("+15559998888".to_string()),
        });

        let eng = engine(activities.clone(), Arc::new(FakeInbox::default()), contacts);
        let agent = agent(CallReceivingDevice::Phone, Some("+15552223333"));

        let matched = eng
            .on_incoming_call_created("CA1", &agent, "+15559998888")
            .await
            .unwrap();
        assert_eq!(matched, Some(5));
        assert_eq!(activities.all()[0].kind, ActivityKind::MissedCall);

        let unmatched = eng
            .on_incoming_call_created("CA2", &agent, "+15317770000")
            .await
            .unwrap();
        assert!(unmatched.is_none());
        assert_eq!(activities.all().len(), 1);
    }

    #[tokio::test]
    async fn test_connected_call_upgrades_activity_by_direction() {
        let activities = Arc::new(FakeActivities::default());
        let eng = engine(
            activities.clone(),
            Arc::new(FakeInbox::default()),
            Arc::new(FakeContacts::default()),
        );
        let agent = agent(CallReceivingDevice::Client, None);

        eng.on_outgoing_call_created("CA1", &agent, &CrmCorrelation::default())
            .await
            .unwrap();
        eng.on_status_event(
            &record(CallDirection::Outgoing, CallStatus::InProgress),
            CallStatus::InProgress,
            &agent,
        )
        .await
        .unwrap();
        assert_eq!(activities.all()[0].kind, ActivityKind::Called);
    }

    #[tokio::test]
    async fn test_missed_incoming_notifies_once() {
        let inbox = Arc::new(FakeInbox::default());
        let eng = engine(
            Arc::new(FakeActivities::default()),
            inbox.clone(),
            Arc::new(FakeContacts::default()),
        );
        let agent = agent(CallReceivingDevice::Phone, None);
        let rec = record(CallDirection::Incoming, CallStatus::NoAnswer);

        eng.on_status_event(&rec, CallStatus::NoAnswer, &agent)
            .await
            .unwrap();
        // Redelivered terminal webhook.
        eng.on_status_event(&rec, CallStatus::NoAnswer, &agent)
            .await
            .unwrap();

        assert_eq!(inbox.all().len(), 1);
        assert_eq!(inbox.all()[0].subject, "Missed call");
    }

    #[tokio::test]
    async fn test_completed_outgoing_never_notifies() {
        let inbox = Arc::new(FakeInbox::default());
        let eng = engine(
            Arc::new(FakeActivities::default()),
            inbox.clone(),
            Arc::new(FakeContacts::default()),
        );

        eng.on_status_event(
            &record(CallDirection::Outgoing, CallStatus::Completed),
            CallStatus::Completed,
            &agent(CallReceivingDevice::Client, None),
        )
        .await
        .unwrap();

        assert!(inbox.all().is_empty());
    }
}
