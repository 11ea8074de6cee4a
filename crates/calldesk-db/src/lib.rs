//! Calldesk Database Layer
//!
//! PostgreSQL database access and repository implementations for the
//! Calldesk CRM backend. It includes:
//!
//! - Connection pool management with sqlx
//! - Call log storage with atomic conditional status updates
//! - Idempotent activity/participant and inbox-notification writes
//! - Read-only agent directory and contact lookups

pub mod pool;
pub mod repositories;

pub use pool::create_pool;
pub use repositories::*;

// Re-export commonly used types
pub use calldesk_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
