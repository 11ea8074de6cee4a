//! Repository traits for the persistence collaborators
//!
//! The orchestration core talks to storage through these abstractions; the
//! PostgreSQL implementations live in `calldesk-db`, and tests substitute
//! in-memory fakes.

use crate::error::AppError;
use crate::models::{
    ActivityKind, AgentProfile, CallDetailsPatch, CallDirection, CallRecord, CallStatus, Contact,
    Lead, NewActivity, NewInboxNotification,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Insert shape for a call record, built from the first lifecycle event
/// seen for a call identifier.
#[derive(Debug, Clone)]
pub struct NewCallRecord {
    pub call_sid: String,
    pub direction: CallDirection,
    pub caller: String,
    pub receiver: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub status: CallStatus,
    pub contact_id: Option<i64>,
}

/// Call record store keyed by provider call identifier
#[async_trait]
pub trait CallLogRepository: Send + Sync {
    /// Insert the record unless one already exists for the same call
    /// identifier; returns the stored record either way, plus whether this
    /// call created it. Creation-scoped side effects key off that flag.
    async fn create_if_absent(&self, new: &NewCallRecord)
        -> Result<(CallRecord, bool), AppError>;

    /// Look up a record by call identifier
    async fn find_by_sid(&self, call_sid: &str) -> Result<Option<CallRecord>, AppError>;

    /// Atomically advance the lifecycle status under the rank ordering.
    ///
    /// Must be a single conditional update ("set status only if the current
    /// status ranks below the new one") so that concurrent events for the
    /// same call cannot lose updates. Returns `true` when the status
    /// actually changed, `false` for stale or duplicate events.
    async fn advance_status(&self, call_sid: &str, status: CallStatus) -> Result<bool, AppError>;

    /// Merge provider call details into the record. Fields are filled in
    /// monotonically; `None` never clears a stored value.
    async fn merge_details(
        &self,
        call_sid: &str,
        patch: &CallDetailsPatch,
    ) -> Result<(), AppError>;
}

/// Activity timeline store
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Create an activity and its participant rows in one transaction.
    ///
    /// Idempotent per (call identifier, kind): when the activity already
    /// exists its id is returned and no participants are added.
    async fn create_with_participants(&self, activity: &NewActivity) -> Result<i64, AppError>;

    /// Rewrite the kind and subject of this call's activity, when its
    /// current kind is one of `from`. Returns the number of rows changed.
    async fn upgrade_kind(
        &self,
        call_sid: &str,
        from: &[ActivityKind],
        to: ActivityKind,
    ) -> Result<u64, AppError>;
}

/// Inbox notification store
#[async_trait]
pub trait InboxRepository: Send + Sync {
    /// Create the notification unless one exists for the same
    /// (user, call record) pair. Returns `true` when a row was created.
    async fn create_if_absent(&self, new: &NewInboxNotification) -> Result<bool, AppError>;
}

/// Read-only directory of agent telephony profiles
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Profile for a software-client identity
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<AgentProfile>, AppError>;

    /// Profile owning a phone number: the assigned provider number or the
    /// agent's personal phone (exact match on the canonical digit form).
    /// Child-leg status callbacks for a call answered on the personal
    /// phone carry only that number, so both must resolve.
    async fn find_by_number(&self, number: &str) -> Result<Option<AgentProfile>, AppError>;
}

/// Read-only CRM contact/lead lookups for call correlation
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// Contact whose mobile phone matches the counterpart number
    async fn find_by_phone(
        &self,
        organization_id: i64,
        number: &str,
    ) -> Result<Option<Contact>, AppError>;

    /// Open lead for the contact's company, if any
    async fn find_lead_for_company(
        &self,
        organization_id: i64,
        company_id: i64,
    ) -> Result<Option<Lead>, AppError>;
}
