//! Calldesk Core Library
//!
//! Foundational types, traits, and error handling for the Calldesk CRM
//! backend. It includes:
//!
//! - Domain models (CallRecord, ActivityRecord, AgentProfile, etc.)
//! - Repository traits for the persistence collaborators
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
