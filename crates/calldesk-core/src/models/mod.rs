//! Domain models

pub mod activity;
pub mod agent;
pub mod call;
pub mod inbox;

pub use activity::{
    ActivityKind, ActivityRecord, NewActivity, NewParticipant, ParticipantRecord, ParticipantRole,
};
pub use agent::{
    AgentProfile, CallReceivingDevice, Contact, Lead, ProviderCredentials, TokenCredentials,
};
pub use call::{CallDetailsPatch, CallDirection, CallRecord, CallStatus};
pub use inbox::{InboxNotification, NewInboxNotification};
