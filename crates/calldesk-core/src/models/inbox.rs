//! Inbox notifications for missed calls
//!
//! One notification per (user, call record): creation is idempotent so that
//! a redelivered terminal webhook does not notify the agent twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user inbox notification row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxNotification {
    pub id: i64,
    pub organization_id: i64,
    pub user_id: Uuid,
    pub call_log_id: i64,
    pub subject: String,
    pub kind: String,
    /// Counterpart number, shown in the notification body
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a new notification
#[derive(Debug, Clone)]
pub struct NewInboxNotification {
    pub organization_id: i64,
    pub user_id: Uuid,
    pub call_log_id: i64,
    pub subject: String,
    pub kind: String,
    pub description: Option<String>,
}

impl NewInboxNotification {
    /// Standard missed-call notification
    pub fn missed_call(
        organization_id: i64,
        user_id: Uuid,
        call_log_id: i64,
        from_number: Option<String>,
    ) -> Self {
        Self {
            organization_id,
            user_id,
            call_log_id,
            subject: "Missed call".to_string(),
            kind: "call".to_string(),
            description: from_number,
        }
    }
}
