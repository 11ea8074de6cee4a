//! Data transfer objects

pub mod common;
pub mod token;
pub mod webhooks;

pub use common::ApiResponse;
pub use token::{AccessTokenRequest, AccessTokenResponse};
pub use webhooks::{shape, CallStatusUpdate, IncomingCallWebhook, StatusRoute, VoiceWebhook};
