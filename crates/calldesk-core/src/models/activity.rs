//! CRM activity timeline entries and their participants
//!
//! Activities are derived side effects of call lifecycle transitions, never
//! of raw event receipt. For a given call identifier at most one activity of
//! a given kind exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Semantic kind of a call activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    AttemptedToCall,
    MissedCall,
    Called,
    IncomingCall,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::AttemptedToCall => "attempted to call",
            ActivityKind::MissedCall => "missed call",
            ActivityKind::Called => "called",
            ActivityKind::IncomingCall => "incoming call",
        }
    }

    /// Default timeline subject for this kind. `{{caller}}`/`{{called}}`
    /// placeholders are rendered by the CRM frontend from the participants.
    pub fn subject(&self) -> &'static str {
        match self {
            ActivityKind::AttemptedToCall => "Attempted to call {{called}}",
            ActivityKind::MissedCall => "Missed call from {{caller}}",
            ActivityKind::Called => "Called {{called}}",
            ActivityKind::IncomingCall => "Incoming call from {{caller}}",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attempted to call" => Ok(ActivityKind::AttemptedToCall),
            "missed call" => Ok(ActivityKind::MissedCall),
            "called" => Ok(ActivityKind::Called),
            "incoming call" => Ok(ActivityKind::IncomingCall),
            other => Err(format!("unknown activity kind: {}", other)),
        }
    }
}

/// Role of a participant on an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Caller,
    Called,
    Author,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Caller => "caller",
            ParticipantRole::Called => "called",
            ParticipantRole::Author => "author",
        }
    }
}

/// Activity timeline entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub call_sid: String,
    pub kind: ActivityKind,
    pub subject: String,
    pub organization_id: i64,
    pub user_id: Option<Uuid>,
    pub lead_id: Option<i64>,
    pub opportunity_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Participant row attached to an activity, pointing at a contact or user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: i64,
    pub activity_id: i64,
    pub role: ParticipantRole,
    pub contact_id: Option<i64>,
    pub user_id: Option<Uuid>,
}

/// Insert shape for a new activity and its participants
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub call_sid: String,
    pub kind: ActivityKind,
    pub subject: String,
    pub organization_id: i64,
    pub user_id: Option<Uuid>,
    pub lead_id: Option<i64>,
    pub opportunity_id: Option<i64>,
    pub participants: Vec<NewParticipant>,
}

/// Insert shape for a participant
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub role: ParticipantRole,
    pub contact_id: Option<i64>,
    pub user_id: Option<Uuid>,
}

impl NewParticipant {
    pub fn contact(role: ParticipantRole, contact_id: i64) -> Self {
        Self {
            role,
            contact_id: Some(contact_id),
            user_id: None,
        }
    }
}
