//! Call-event orchestration core
//!
//! Everything between a provider webhook and the CRM's persisted state:
//! identity resolution, routing decisions and their markup encoding, the
//! call lifecycle state machine, derived CRM side effects, webhook
//! signature verification, the provider REST client, and voice access
//! tokens for the browser softphone.

pub mod identity;
pub mod lifecycle;
pub mod provider;
pub mod routing;
pub mod side_effects;
pub mod signature;
pub mod token;
pub mod twiml;

#[cfg(test)]
mod test_support;

pub use identity::{Identity, IdentityResolver, ResolvedIdentity};
pub use lifecycle::{CallEvent, LifecycleTracker};
pub use provider::{CallDetails, ProviderClient, TwilioClient};
pub use routing::{Directive, RoutingEngine};
pub use side_effects::{CrmCorrelation, EffectPolicy, SideEffectEngine};
pub use signature::{parse_form_body, SignatureVerifier};
