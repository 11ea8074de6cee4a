//! HTTP handlers

pub mod health;
pub mod token;
pub mod webhooks;

pub use health::configure as configure_health;
pub use token::configure as configure_tokens;
pub use webhooks::configure as configure_webhooks;
