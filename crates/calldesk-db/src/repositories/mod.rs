//! Repository implementations
//!
//! Concrete implementations of the repository traits defined in
//! calldesk-core, using sqlx for PostgreSQL access.

pub mod activity_repo;
pub mod agent_repo;
pub mod call_log_repo;
pub mod contact_repo;
pub mod inbox_repo;

pub use activity_repo::PgActivityRepository;
pub use agent_repo::PgAgentDirectory;
pub use call_log_repo::PgCallLogRepository;
pub use contact_repo::PgContactRepository;
pub use inbox_repo::PgInboxRepository;
