//! In-memory repository fakes for unit tests

use crate::provider::{CallDetails, ProviderClient};
use async_trait::async_trait;
use calldesk_core::{
    models::{
        ActivityKind, CallDetailsPatch, CallRecord, CallStatus, Contact, Lead, NewActivity,
        NewInboxNotification, ProviderCredentials,
    },
    traits::{ActivityRepository, CallLogRepository, ContactRepository, InboxRepository, NewCallRecord},
    AppError, AppResult,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeActivities {
    rows: Mutex<Vec<NewActivity>>,
}

impl FakeActivities {
    pub fn all(&self) -> Vec<NewActivity> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityRepository for FakeActivities {
    async fn create_with_participants(&self, activity: &NewActivity) -> AppResult<i64> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(pos) = rows
            .iter()
            .position(|a| a.call_sid == activity.call_sid && a.kind == activity.kind)
        {
            return Ok(pos as i64 + 1);
        }
        rows.push(activity.clone());
        Ok(rows.len() as i64)
    }

    async fn upgrade_kind(
        &self,
        call_sid: &str,
        from: &[ActivityKind],
        to: ActivityKind,
    ) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut changed = 0;
        for row in rows.iter_mut() {
            if row.call_sid == call_sid && from.contains(&row.kind) {
                row.kind = to;
                row.subject = to.subject().to_string();
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[derive(Default)]
pub struct FakeInbox {
    rows: Mutex<Vec<NewInboxNotification>>,
}

impl FakeInbox {
    pub fn all(&self) -> Vec<NewInboxNotification> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl InboxRepository for FakeInbox {
    async fn create_if_absent(&self, new: &NewInboxNotification) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|n| n.user_id == new.user_id && n.call_log_id == new.call_log_id)
        {
            return Ok(false);
        }
        rows.push(new.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct FakeCallLog {
    rows: Mutex<HashMap<String, CallRecord>>,
}

impl FakeCallLog {
    pub fn get(&self, call_sid: &str) -> Option<CallRecord> {
        self.rows.lock().unwrap().get(call_sid).cloned()
    }
}

#[async_trait]
impl CallLogRepository for FakeCallLog {
    async fn create_if_absent(&self, new: &NewCallRecord) -> AppResult<(CallRecord, bool)> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get(&new.call_sid) {
            return Ok((existing.clone(), false));
        }
        let now = Utc::now();
        let record = CallRecord {
            id: rows.len() as i64 + 1,
            call_sid: new.call_sid.clone(),
            direction: new.direction,
            caller: new.caller.clone(),
            receiver: new.receiver.clone(),
            from_number: new.from_number.clone(),
            to_number: new.to_number.clone(),
            status: new.status,
            duration: None,
            price: None,
            price_unit: None,
            recording_url: None,
            start_time: None,
            end_time: None,
            contact_id: new.contact_id,
            created_at: now,
            updated_at: now,
        };
        rows.insert(new.call_sid.clone(), record.clone());
        Ok((record, true))
    }

    async fn find_by_sid(&self, call_sid: &str) -> AppResult<Option<CallRecord>> {
        Ok(self.rows.lock().unwrap().get(call_sid).cloned())
    }

    async fn advance_status(&self, call_sid: &str, status: CallStatus) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows
            .get_mut(call_sid)
            .ok_or_else(|| AppError::NotFound(format!("call {}", call_sid)))?;
        if status.supersedes(record.status) {
            record.status = status;
            record.updated_at = Utc::now();
            return Ok(true);
        }
        Ok(false)
    }

    async fn merge_details(&self, call_sid: &str, patch: &CallDetailsPatch) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows
            .get_mut(call_sid)
            .ok_or_else(|| AppError::NotFound(format!("call {}", call_sid)))?;
        // Patch-wins, same as the SQL COALESCE($n, stored) merge.
        record.duration = patch.duration.or(record.duration);
        record.price = patch.price.or(record.price);
        record.price_unit = patch.price_unit.clone().or_else(|| record.price_unit.take());
        record.recording_url = patch
            .recording_url
            .clone()
            .or_else(|| record.recording_url.take());
        record.start_time = patch.start_time.or(record.start_time);
        record.end_time = patch.end_time.or(record.end_time);
        record.updated_at = Utc::now();
        Ok(())
    }
}

/// Scripted provider: returns fixed call details and records every
/// mid-call message it is asked to relay.
#[derive(Default)]
pub struct FakeProvider {
    pub details: Mutex<CallDetails>,
    pub fail_details: Mutex<bool>,
    messages: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeProvider {
    pub fn with_details(details: CallDetails) -> Self {
        Self {
            details: Mutex::new(details),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, serde_json::Value)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn fetch_call_details(
        &self,
        _credentials: &ProviderCredentials,
        _call_sid: &str,
    ) -> AppResult<CallDetails> {
        if *self.fail_details.lock().unwrap() {
            return Err(AppError::ProviderUnavailable("scripted failure".to_string()));
        }
        Ok(self.details.lock().unwrap().clone())
    }

    async fn send_mid_call_message(
        &self,
        _credentials: &ProviderCredentials,
        call_sid: &str,
        payload: &serde_json::Value,
    ) -> AppResult<()> {
        self.messages
            .lock()
            .unwrap()
            .push((call_sid.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeContacts {
    contacts: Mutex<Vec<Contact>>,
    leads: Mutex<Vec<Lead>>,
}

impl FakeContacts {
    pub fn insert(&self, contact: Contact) {
        self.contacts.lock().unwrap().push(contact);
    }

    pub fn insert_lead(&self, lead: Lead) {
        self.leads.lock().unwrap().push(lead);
    }
}

#[async_trait]
impl ContactRepository for FakeContacts {
    async fn find_by_phone(
        &self,
        organization_id: i64,
        number: &str,
    ) -> AppResult<Option<Contact>> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.organization_id == organization_id
                    && c.mobile_phone.as_deref() == Some(number)
            })
            .cloned())
    }

    async fn find_lead_for_company(
        &self,
        organization_id: i64,
        company_id: i64,
    ) -> AppResult<Option<Lead>> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.organization_id == organization_id && l.company_id == Some(company_id))
            .cloned())
    }
}
