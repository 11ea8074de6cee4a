//! Activity repository implementation
//!
//! Creates CRM timeline entries and their participant rows. The activity
//! insert and its participants run in one transaction, and uniqueness on
//! (call_sid, kind) makes creation idempotent against webhook redelivery.

use async_trait::async_trait;
use calldesk_core::{
    models::{ActivityKind, NewActivity},
    traits::ActivityRepository,
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of ActivityRepository
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    /// Create a new activity repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    #[instrument(skip(self, activity), fields(call_sid = %activity.call_sid, kind = %activity.kind))]
    async fn create_with_participants(&self, activity: &NewActivity) -> AppResult<i64> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO activities (
                call_sid, kind, subject, organization_id,
                user_id, lead_id, opportunity_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (call_sid, kind) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&activity.call_sid)
        .bind(activity.kind.as_str())
        .bind(&activity.subject)
        .bind(activity.organization_id)
        .bind(activity.user_id)
        .bind(activity.lead_id)
        .bind(activity.opportunity_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error creating activity: {}", e);
            AppError::Database(format!("Failed to create activity: {}", e))
        })?;

        let activity_id = match inserted {
            Some((id,)) => {
                for participant in &activity.participants {
                    sqlx::query(
                        r#"
                        INSERT INTO activity_participants (activity_id, role, contact_id, user_id)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(id)
                    .bind(participant.role.as_str())
                    .bind(participant.contact_id)
                    .bind(participant.user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        error!("Database error creating participant: {}", e);
                        AppError::Database(format!("Failed to create participant: {}", e))
                    })?;
                }
                id
            }
            None => {
                // Redelivered event: the activity (and its participants)
                // already exist for this call identifier and kind.
                debug!("Activity already exists, skipping participants");
                let (id,): (i64,) = sqlx::query_as(
                    "SELECT id FROM activities WHERE call_sid = $1 AND kind = $2",
                )
                .bind(&activity.call_sid)
                .bind(activity.kind.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Database error fetching existing activity: {}", e);
                    AppError::Database(format!("Failed to fetch existing activity: {}", e))
                })?;
                id
            }
        };

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(activity_id)
    }

    #[instrument(skip(self))]
    async fn upgrade_kind(
        &self,
        call_sid: &str,
        from: &[ActivityKind],
        to: ActivityKind,
    ) -> AppResult<u64> {
        let from_kinds: Vec<String> = from.iter().map(|k| k.as_str().to_string()).collect();

        let result = sqlx::query(
            r#"
            UPDATE activities
            SET kind = $2, subject = $3, updated_at = NOW()
            WHERE call_sid = $1 AND kind = ANY($4)
            "#,
        )
        .bind(call_sid)
        .bind(to.as_str())
        .bind(to.subject())
        .bind(&from_kinds)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error upgrading activity kind: {}", e);
            AppError::Database(format!("Failed to upgrade activity: {}", e))
        })?;

        Ok(result.rows_affected())
    }
}
