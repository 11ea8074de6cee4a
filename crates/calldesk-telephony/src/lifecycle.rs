//! Call lifecycle tracking
//!
//! Reconciles the stream of provider status callbacks for one call into a
//! single record. Events may arrive duplicated or out of order; the status
//! rank ordering plus the repository's atomic conditional update make every
//! permutation converge on the same final state.

use crate::provider::ProviderClient;
use crate::side_effects::SideEffectEngine;
use calldesk_core::{
    models::{AgentProfile, CallDetailsPatch, CallDirection, CallRecord, CallStatus},
    traits::{CallLogRepository, NewCallRecord},
    AppError, AppResult,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const RELAY_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A validated status-update event
///
/// Parsed from the raw webhook form before any state mutation; a payload
/// that cannot produce a `CallEvent` is rejected with nothing persisted.
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Identifier of the leg this callback describes
    pub call_sid: String,
    /// Parent leg identifier, present on child-leg callbacks. The call
    /// record is keyed by the parent when one exists.
    pub parent_call_sid: Option<String>,
    pub status: CallStatus,
    pub caller: Option<String>,
    pub called: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub duration: Option<i32>,
    /// Present only once recording completes
    pub recording_url: Option<String>,
}

impl CallEvent {
    /// The call identifier the record is keyed by
    pub fn record_sid(&self) -> &str {
        self.parent_call_sid.as_deref().unwrap_or(&self.call_sid)
    }

    /// Event-level fields worth merging into the record right away,
    /// ahead of the authoritative provider fetch. Counterpart numbers are
    /// excluded: child-leg events carry leg-local numbers that must not
    /// rewrite what the record was created with.
    fn patch(&self) -> CallDetailsPatch {
        CallDetailsPatch {
            duration: self.duration,
            recording_url: self.recording_url.clone(),
            ..Default::default()
        }
    }
}

/// The core state machine over the call record store
pub struct LifecycleTracker {
    calls: Arc<dyn CallLogRepository>,
    provider: Arc<dyn ProviderClient>,
    effects: Arc<SideEffectEngine>,
}

impl LifecycleTracker {
    pub fn new(
        calls: Arc<dyn CallLogRepository>,
        provider: Arc<dyn ProviderClient>,
        effects: Arc<SideEffectEngine>,
    ) -> Self {
        Self {
            calls,
            provider,
            effects,
        }
    }

    /// Create the call record for an initiation webhook. Idempotent per
    /// call identifier; returns the record plus whether this call created
    /// it, so creation-scoped side effects run exactly once.
    #[instrument(skip(self, new), fields(call_sid = %new.call_sid))]
    pub async fn record_initiated(&self, new: NewCallRecord) -> AppResult<(CallRecord, bool)> {
        let (record, created) = self.calls.create_if_absent(&new).await?;
        if created {
            info!(direction = %record.direction, "Created call record");
        }
        Ok((record, created))
    }

    /// Merge one status-update event into the call record.
    ///
    /// Ordering inside this method is deliberate: the status advance is
    /// persisted before any fallible enrichment, so a provider outage can
    /// delay metadata but never lose a transition. Side-effect failures are
    /// logged and re-derived from the next matching event; a failed detail
    /// fetch surfaces `ProviderUnavailable` so the provider redelivers.
    #[instrument(skip(self, event, agent), fields(call_sid = %event.record_sid(), status = %event.status))]
    pub async fn apply_status_event(
        &self,
        event: &CallEvent,
        direction: CallDirection,
        agent: &AgentProfile,
    ) -> AppResult<()> {
        if event.call_sid.trim().is_empty() {
            return Err(AppError::Validation("event carries no call sid".to_string()));
        }

        let record_sid = event.record_sid().to_string();

        let (record, created) = self
            .calls
            .create_if_absent(&NewCallRecord {
                call_sid: record_sid.clone(),
                direction,
                caller: event.caller.clone().unwrap_or_default(),
                receiver: event.called.clone(),
                from_number: event.from_number.clone(),
                to_number: event.to_number.clone(),
                status: CallStatus::Initiated,
                contact_id: None,
            })
            .await?;
        if created {
            debug!("Status event arrived before the initiation record; created one");
        }

        let advanced = self.calls.advance_status(&record_sid, event.status).await?;
        if !advanced {
            debug!(current = %record.status, "Stale or duplicate status event");
        }

        if !event.status.is_terminal() {
            self.relay_status(&record_sid, event, agent);
        }

        let event_patch = event.patch();
        if !event_patch.is_empty() {
            self.calls.merge_details(&record_sid, &event_patch).await?;
        }

        if let Err(e) = self.effects.on_status_event(&record, event.status, agent).await {
            warn!(error = %e, "Side-effect derivation failed; will retry on the next event");
        }

        if event.status.is_reportable() {
            let details = self
                .provider
                .fetch_call_details(&agent.credentials, &record_sid)
                .await?;
            self.calls
                .merge_details(&record_sid, &details.into())
                .await?;
        }

        Ok(())
    }

    /// Relay the raw event to the parent leg so a connected softphone can
    /// reflect live status. Best effort: spawned, one retry, never blocks
    /// or fails the merge.
    fn relay_status(&self, record_sid: &str, event: &CallEvent, agent: &AgentProfile) {
        let provider = Arc::clone(&self.provider);
        let credentials = agent.credentials.clone();
        let sid = record_sid.to_string();
        let payload = json!({
            "CallSid": event.call_sid,
            "CallStatus": event.status.as_str(),
            "From": event.from_number,
            "To": event.to_number,
        });

        tokio::spawn(async move {
            for attempt in 0..2u8 {
                match provider.send_mid_call_message(&credentials, &sid, &payload).await {
                    Ok(()) => return,
                    Err(e) if attempt == 0 => {
                        debug!(call_sid = %sid, error = %e, "Mid-call relay failed, retrying");
                        tokio::time::sleep(RELAY_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        warn!(call_sid = %sid, error = %e, "Mid-call relay failed");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side_effects::{CrmCorrelation, EffectPolicy};
    use crate::test_support::{
        FakeActivities, FakeCallLog, FakeContacts, FakeInbox, FakeProvider,
    };
    use crate::provider::CallDetails;
    use calldesk_core::config::TelephonyConfig;
    use calldesk_core::models::{ActivityKind, CallReceivingDevice, ProviderCredentials};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    struct Harness {
        calls: Arc<FakeCallLog>,
        provider: Arc<FakeProvider>,
        activities: Arc<FakeActivities>,
        inbox: Arc<FakeInbox>,
        tracker: LifecycleTracker,
    }

    fn harness(provider: FakeProvider) -> Harness {
        let calls = Arc::new(FakeCallLog::default());
        let provider = Arc::new(provider);
        let activities = Arc::new(FakeActivities::default());
        let inbox = Arc::new(FakeInbox::default());
        let effects = Arc::new(SideEffectEngine::new(
            activities.clone(),
            inbox.clone(),
            Arc::new(FakeContacts::default()),
            EffectPolicy::from_config(&TelephonyConfig::default()),
        ));
        let tracker = LifecycleTracker::new(calls.clone(), provider.clone(), effects);
        Harness {
            calls,
            provider,
            activities,
            inbox,
            tracker,
        }
    }

    fn agent() -> AgentProfile {
        AgentProfile {
            user_id: Uuid::parse_str("9f3c1a26-0000-4000-8000-1234567890ab").unwrap(),
            organization_id: 7,
            phone: None,
            agent_number: Some("+15550001111".to_string()),
            call_receiving_device: CallReceivingDevice::Client,
            credentials: ProviderCredentials {
                account_sid: Some("AC1".to_string()),
                auth_token: Some("token".to_string()),
                ..Default::default()
            },
        }
    }

    fn event(status: CallStatus) -> CallEvent {
        CallEvent {
            call_sid: "CAchild".to_string(),
            parent_call_sid: Some("CAparent".to_string()),
            status,
            caller: Some("client:9f3c1a26-0000-4000-8000-1234567890ab".to_string()),
            called: Some("+15559998888".to_string()),
            from_number: Some("+15550001111".to_string()),
            to_number: Some("+15559998888".to_string()),
            duration: None,
            recording_url: None,
        }
    }

    fn details() -> CallDetails {
        CallDetails {
            duration: Some(42),
            price: Some(dec!(-0.03)),
            price_unit: Some("USD".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_event_creates_record_keyed_by_parent() {
        let h = harness(FakeProvider::default());
        h.tracker
            .apply_status_event(&event(CallStatus::Ringing), CallDirection::Outgoing, &agent())
            .await
            .unwrap();

        let record = h.calls.get("CAparent").unwrap();
        assert_eq!(record.status, CallStatus::Ringing);
        assert!(h.calls.get("CAchild").is_none());
    }

    #[tokio::test]
    async fn test_every_event_permutation_converges() {
        let statuses = [
            CallStatus::Initiated,
            CallStatus::Ringing,
            CallStatus::InProgress,
            CallStatus::Completed,
        ];
        // All 24 delivery orders of the four lifecycle events.
        let orders = [
            [0, 1, 2, 3], [0, 1, 3, 2], [0, 2, 1, 3], [0, 2, 3, 1], [0, 3, 1, 2], [0, 3, 2, 1],
            [1, 0, 2, 3], [1, 0, 3, 2], [1, 2, 0, 3], [1, 2, 3, 0], [1, 3, 0, 2], [1, 3, 2, 0],
            [2, 0, 1, 3], [2, 0, 3, 1], [2, 1, 0, 3], [2, 1, 3, 0], [2, 3, 0, 1], [2, 3, 1, 0],
            [3, 0, 1, 2], [3, 0, 2, 1], [3, 1, 0, 2], [3, 1, 2, 0], [3, 2, 0, 1], [3, 2, 1, 0],
        ];

        for order in orders {
            let h = harness(FakeProvider::with_details(details()));
            for idx in order {
                h.tracker
                    .apply_status_event(
                        &event(statuses[idx]),
                        CallDirection::Outgoing,
                        &agent(),
                    )
                    .await
                    .unwrap();
            }

            let record = h.calls.get("CAparent").unwrap();
            assert_eq!(record.status, CallStatus::Completed, "order {:?}", order);
            assert_eq!(record.duration, Some(42), "order {:?}", order);
        }
    }

    #[tokio::test]
    async fn test_child_leg_numbers_never_rewrite_record() {
        let h = harness(FakeProvider::with_details(details()));
        h.tracker
            .record_initiated(NewCallRecord {
                call_sid: "CAparent".to_string(),
                direction: CallDirection::Incoming,
                caller: "+15559998888".to_string(),
                receiver: Some("+15550001111".to_string()),
                from_number: Some("+15559998888".to_string()),
                to_number: Some("+15550001111".to_string()),
                status: CallStatus::Initiated,
                contact_id: None,
            })
            .await
            .unwrap();

        // The child leg towards the softphone reports leg-local
        // identifiers; they must not replace the creation-time numbers.
        let mut evt = event(CallStatus::InProgress);
        evt.called = Some("client:9f3c1a26-0000-4000-8000-1234567890ab".to_string());
        evt.to_number = Some("client:9f3c1a26-0000-4000-8000-1234567890ab".to_string());
        h.tracker
            .apply_status_event(&evt, CallDirection::Incoming, &agent())
            .await
            .unwrap();

        let record = h.calls.get("CAparent").unwrap();
        assert_eq!(record.to_number.as_deref(), Some("+15550001111"));
        assert_eq!(record.receiver.as_deref(), Some("+15550001111"));
        assert_eq!(record.duration, Some(42));
    }

    #[tokio::test]
    async fn test_first_terminal_wins_over_racing_terminal() {
        let h = harness(FakeProvider::with_details(details()));
        h.tracker
            .apply_status_event(&event(CallStatus::NoAnswer), CallDirection::Outgoing, &agent())
            .await
            .unwrap();
        h.tracker
            .apply_status_event(&event(CallStatus::Completed), CallDirection::Outgoing, &agent())
            .await
            .unwrap();

        assert_eq!(h.calls.get("CAparent").unwrap().status, CallStatus::NoAnswer);
    }

    #[tokio::test]
    async fn test_detail_fetch_failure_keeps_status_and_surfaces_outage() {
        let provider = FakeProvider::default();
        *provider.fail_details.lock().unwrap() = true;
        let h = harness(provider);

        let result = h
            .tracker
            .apply_status_event(&event(CallStatus::Completed), CallDirection::Outgoing, &agent())
            .await;

        assert!(matches!(result, Err(AppError::ProviderUnavailable(_))));
        // Status persisted independently of enrichment.
        assert_eq!(h.calls.get("CAparent").unwrap().status, CallStatus::Completed);
    }

    #[tokio::test]
    async fn test_redelivered_terminal_enriches_after_outage() {
        let provider = FakeProvider::default();
        *provider.fail_details.lock().unwrap() = true;
        let h = harness(provider);

        let evt = event(CallStatus::Completed);
        let _ = h
            .tracker
            .apply_status_event(&evt, CallDirection::Outgoing, &agent())
            .await;

        *h.provider.fail_details.lock().unwrap() = false;
        *h.provider.details.lock().unwrap() = details();
        h.tracker
            .apply_status_event(&evt, CallDirection::Outgoing, &agent())
            .await
            .unwrap();

        let record = h.calls.get("CAparent").unwrap();
        assert_eq!(record.duration, Some(42));
        assert_eq!(record.price, Some(dec!(-0.03)));
    }

    #[tokio::test]
    async fn test_non_terminal_events_relay_to_parent_leg() {
        let h = harness(FakeProvider::default());
        h.tracker
            .apply_status_event(&event(CallStatus::Ringing), CallDirection::Outgoing, &agent())
            .await
            .unwrap();

        // The relay is spawned; yield until it lands.
        for _ in 0..50 {
            if !h.provider.messages().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let messages = h.provider.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "CAparent");
        assert_eq!(messages[0].1["CallStatus"], "ringing");
    }

    #[tokio::test]
    async fn test_terminal_events_do_not_relay() {
        let h = harness(FakeProvider::with_details(details()));
        h.tracker
            .apply_status_event(&event(CallStatus::Completed), CallDirection::Outgoing, &agent())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.provider.messages().is_empty());
    }

    #[tokio::test]
    async fn test_connected_outgoing_upgrades_created_activity() {
        let h = harness(FakeProvider::with_details(details()));
        let effects = SideEffectEngine::new(
            h.activities.clone(),
            h.inbox.clone(),
            Arc::new(FakeContacts::default()),
            EffectPolicy::from_config(&TelephonyConfig::default()),
        );
        effects
            .on_outgoing_call_created("CAparent", &agent(), &CrmCorrelation::default())
            .await
            .unwrap();

        h.tracker
            .apply_status_event(&event(CallStatus::InProgress), CallDirection::Outgoing, &agent())
            .await
            .unwrap();

        assert_eq!(h.activities.all()[0].kind, ActivityKind::Called);
    }

    #[tokio::test]
    async fn test_event_without_sid_rejected_before_writes() {
        let h = harness(FakeProvider::default());
        let mut evt = event(CallStatus::Ringing);
        evt.call_sid = " ".to_string();
        evt.parent_call_sid = None;

        let result = h
            .tracker
            .apply_status_event(&evt, CallDirection::Outgoing, &agent())
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
