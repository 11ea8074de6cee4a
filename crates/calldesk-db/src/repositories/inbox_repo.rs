//! Inbox notification repository implementation
//!
//! Uniqueness on (user_id, call_log_id) makes missed-call notifications
//! idempotent against redelivered terminal webhooks.

use async_trait::async_trait;
use calldesk_core::{
    models::NewInboxNotification, traits::InboxRepository, AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of InboxRepository
pub struct PgInboxRepository {
    pool: PgPool,
}

impl PgInboxRepository {
    /// Create a new inbox repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboxRepository for PgInboxRepository {
    #[instrument(skip(self, new), fields(user_id = %new.user_id, call_log_id = new.call_log_id))]
    async fn create_if_absent(&self, new: &NewInboxNotification) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO inbox_notifications (
                organization_id, user_id, call_log_id, subject, kind, description
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, call_log_id) DO NOTHING
            "#,
        )
        .bind(new.organization_id)
        .bind(new.user_id)
        .bind(new.call_log_id)
        .bind(&new.subject)
        .bind(&new.kind)
        .bind(&new.description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating inbox notification: {}", e);
            AppError::Database(format!("Failed to create inbox notification: {}", e))
        })?;

        let created = result.rows_affected() > 0;
        debug!(created, "Inbox notification insert");
        Ok(created)
    }
}
