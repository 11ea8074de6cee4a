//! HTTP surface for Calldesk
//!
//! Provider webhook endpoints, the voice access token endpoint, and the
//! shared application state they run on.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;
pub mod state;

pub use dto::ApiResponse;
pub use handlers::{configure_health, configure_tokens, configure_webhooks};
pub use state::AppState;
