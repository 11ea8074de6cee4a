//! Shared application state for the HTTP layer

use calldesk_core::config::TelephonyConfig;
use calldesk_telephony::{
    IdentityResolver, LifecycleTracker, RoutingEngine, SideEffectEngine, SignatureVerifier,
};
use std::sync::Arc;

/// Everything the webhook and token handlers need, wired once at startup
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
    pub routing: RoutingEngine,
    pub tracker: Arc<LifecycleTracker>,
    pub effects: Arc<SideEffectEngine>,
    pub verifier: SignatureVerifier,
    pub telephony: TelephonyConfig,
}
