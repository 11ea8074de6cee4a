//! Call record model and lifecycle status algebra
//!
//! One `CallRecord` exists per provider call identifier. Status events for
//! the same identifier may arrive duplicated or out of order; the `rank`
//! ordering on `CallStatus` is the sole merge rule.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Call direction, derived once from the shape of the initiating identifier
/// (a `client:`-tagged identifier places an outgoing call) and never
/// recomputed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Outgoing => "outgoing",
            CallDirection::Incoming => "incoming",
        }
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outgoing" => Ok(CallDirection::Outgoing),
            "incoming" => Ok(CallDirection::Incoming),
            other => Err(format!("unknown call direction: {}", other)),
        }
    }
}

/// Call lifecycle status
///
/// `initiated -> ringing -> in-progress -> {completed|busy|no-answer|failed|canceled}`
///
/// The four bracketed statuses are terminal. `rank()` defines the merge
/// ordering: a status never overwrites a higher-ranked one, and terminal
/// statuses share a rank so the first terminal status received wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    NoAnswer,
    Failed,
    Canceled,
}

impl CallStatus {
    /// Position in the lifecycle ordering. All terminal statuses rank equal.
    pub fn rank(&self) -> u8 {
        match self {
            CallStatus::Initiated => 0,
            CallStatus::Ringing => 1,
            CallStatus::InProgress => 2,
            CallStatus::Completed
            | CallStatus::Busy
            | CallStatus::NoAnswer
            | CallStatus::Failed
            | CallStatus::Canceled => 3,
        }
    }

    /// No further lifecycle progression occurs from a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }

    /// Whether `self` may overwrite `current` under the merge rule.
    ///
    /// Strict rank comparison: equal ranks never overwrite, which makes
    /// duplicate deliveries and racing terminal callbacks no-ops.
    pub fn supersedes(&self, current: CallStatus) -> bool {
        current.rank() < self.rank()
    }

    /// The call connected or ended; authoritative provider metadata
    /// (price, duration, recording) is available from this point.
    pub fn is_reportable(&self) -> bool {
        self.rank() >= 2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Initiated => "initiated",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Busy => "busy",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Failed => "failed",
            CallStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // The provider reports "queued" for a freshly created leg.
            "queued" | "initiated" => Ok(CallStatus::Initiated),
            "ringing" => Ok(CallStatus::Ringing),
            "in-progress" | "answered" => Ok(CallStatus::InProgress),
            "completed" => Ok(CallStatus::Completed),
            "busy" => Ok(CallStatus::Busy),
            "no-answer" => Ok(CallStatus::NoAnswer),
            "failed" => Ok(CallStatus::Failed),
            "canceled" => Ok(CallStatus::Canceled),
            other => Err(format!("unknown call status: {}", other)),
        }
    }
}

/// Call record
///
/// One row per provider call identifier. Created on the first lifecycle
/// event for that identifier, mutated by every subsequent one, never
/// deleted by the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique identifier
    pub id: i64,

    /// Provider call identifier (unique, immutable once created)
    pub call_sid: String,

    /// Direction derived from the initiating identifier's shape
    pub direction: CallDirection,

    /// Raw initiating identifier (`client:U1` or a phone number)
    pub caller: String,

    /// Raw receiving identifier, once known
    pub receiver: Option<String>,

    /// Counterpart numbers as reported by the provider
    pub from_number: Option<String>,
    pub to_number: Option<String>,

    /// Current lifecycle status
    pub status: CallStatus,

    /// Billable duration in seconds, from the provider's call details
    pub duration: Option<i32>,

    /// Call price and currency, from the provider's call details
    pub price: Option<Decimal>,
    pub price_unit: Option<String>,

    /// Recording reference, present once recording completes
    pub recording_url: Option<String>,

    /// Provider-reported call timestamps
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// Optional link to a CRM contact
    pub contact_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// The call never connected and ended in a missed outcome.
    pub fn is_missed(&self) -> bool {
        matches!(self.status, CallStatus::Busy | CallStatus::NoAnswer)
    }
}

/// Enrichment patch for a call record
///
/// A present field replaces the persisted value, an absent one leaves it
/// untouched. The counterpart numbers are not patchable: they are set once
/// at record creation and never rewritten by later events.
#[derive(Debug, Clone, Default)]
pub struct CallDetailsPatch {
    pub duration: Option<i32>,
    pub price: Option<Decimal>,
    pub price_unit: Option<String>,
    pub recording_url: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl CallDetailsPatch {
    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.price.is_none()
            && self.price_unit.is_none()
            && self.recording_url.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
    }
}
