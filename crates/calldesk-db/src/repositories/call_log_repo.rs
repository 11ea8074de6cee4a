//! Call log repository implementation
//!
//! PostgreSQL-backed storage for call records, keyed by provider call
//! identifier. Uses runtime queries (not compile-time macros) to avoid
//! requiring a database connection at build time.
//!
//! The status advance is a single conditional UPDATE so that concurrent
//! events for the same call identifier cannot lose updates: the lifecycle
//! rank comparison happens inside the statement, not in application code.

use async_trait::async_trait;
use calldesk_core::{
    models::{CallDetailsPatch, CallDirection, CallRecord, CallStatus},
    traits::{CallLogRepository, NewCallRecord},
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};

/// PostgreSQL implementation of CallLogRepository
pub struct PgCallLogRepository {
    pool: PgPool,
}

impl PgCallLogRepository {
    /// Create a new call log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CALL_LOG_SELECT_COLUMNS: &str = r#"
    id, call_sid, direction, caller, receiver,
    from_number, to_number, status,
    duration, price, price_unit, recording_url,
    start_time, end_time, contact_id,
    created_at, updated_at
"#;

/// Lifecycle rank of a stored status, inlined into conditional updates
const STATUS_RANK_CASE: &str = r#"
    CASE status
        WHEN 'initiated' THEN 0
        WHEN 'ringing' THEN 1
        WHEN 'in-progress' THEN 2
        ELSE 3
    END
"#;

/// Postgres SQLSTATE codes that warrant one retry of a conditional update
fn is_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

#[async_trait]
impl CallLogRepository for PgCallLogRepository {
    #[instrument(skip(self, new), fields(call_sid = %new.call_sid))]
    async fn create_if_absent(&self, new: &NewCallRecord) -> AppResult<(CallRecord, bool)> {
        debug!("Creating call record if absent");

        let query = format!(
            r#"
            INSERT INTO call_logs (
                call_sid, direction, caller, receiver,
                from_number, to_number, status, contact_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (call_sid) DO NOTHING
            RETURNING {}
            "#,
            CALL_LOG_SELECT_COLUMNS
        );

        let inserted = sqlx::query_as::<sqlx::Postgres, CallLogRow>(&query)
            .bind(&new.call_sid)
            .bind(new.direction.as_str())
            .bind(&new.caller)
            .bind(&new.receiver)
            .bind(&new.from_number)
            .bind(&new.to_number)
            .bind(new.status.as_str())
            .bind(new.contact_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error creating call record: {}", e);
                AppError::Database(format!("Failed to create call record: {}", e))
            })?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        // Another event for the same call identifier won the insert.
        let existing = self
            .find_by_sid(&new.call_sid)
            .await?
            .ok_or_else(|| AppError::Database("call record vanished after insert race".into()))?;
        Ok((existing, false))
    }

    #[instrument(skip(self))]
    async fn find_by_sid(&self, call_sid: &str) -> AppResult<Option<CallRecord>> {
        let query = format!(
            "SELECT {} FROM call_logs WHERE call_sid = $1",
            CALL_LOG_SELECT_COLUMNS
        );

        let row = sqlx::query_as::<sqlx::Postgres, CallLogRow>(&query)
            .bind(call_sid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding call record: {}", e);
                AppError::Database(format!("Failed to find call record: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn advance_status(&self, call_sid: &str, status: CallStatus) -> AppResult<bool> {
        let query = format!(
            r#"
            UPDATE call_logs
            SET status = $2, updated_at = NOW()
            WHERE call_sid = $1 AND ({}) < $3
            "#,
            STATUS_RANK_CASE
        );

        let run = || async {
            sqlx::query(&query)
                .bind(call_sid)
                .bind(status.as_str())
                .bind(i32::from(status.rank()))
                .execute(&self.pool)
                .await
        };

        let result = match run().await {
            Ok(result) => result,
            Err(e) if is_conflict(&e) => {
                warn!("Conditional status update conflicted, retrying once: {}", e);
                run().await.map_err(|e| {
                    error!("Status update failed after retry: {}", e);
                    AppError::PersistenceConflict(format!(
                        "status update for call {} failed twice: {}",
                        call_sid, e
                    ))
                })?
            }
            Err(e) => {
                error!("Database error advancing call status: {}", e);
                return Err(AppError::Database(format!(
                    "Failed to advance call status: {}",
                    e
                )));
            }
        };

        let advanced = result.rows_affected() > 0;
        debug!(
            call_sid,
            status = status.as_str(),
            advanced,
            "Conditional status advance"
        );
        Ok(advanced)
    }

    #[instrument(skip(self, patch))]
    async fn merge_details(&self, call_sid: &str, patch: &CallDetailsPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        // COALESCE keeps enrichment monotonic: absent patch fields never
        // clear what an earlier event already persisted.
        sqlx::query(
            r#"
            UPDATE call_logs
            SET duration      = COALESCE($2, duration),
                price         = COALESCE($3, price),
                price_unit    = COALESCE($4, price_unit),
                recording_url = COALESCE($5, recording_url),
                start_time    = COALESCE($6, start_time),
                end_time      = COALESCE($7, end_time),
                updated_at    = NOW()
            WHERE call_sid = $1
            "#,
        )
        .bind(call_sid)
        .bind(patch.duration)
        .bind(patch.price)
        .bind(&patch.price_unit)
        .bind(&patch.recording_url)
        .bind(patch.start_time)
        .bind(patch.end_time)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error merging call details: {}", e);
            AppError::Database(format!("Failed to merge call details: {}", e))
        })?;

        Ok(())
    }
}

/// Helper struct for mapping database rows to the domain model
#[derive(Debug, sqlx::FromRow)]
struct CallLogRow {
    id: i64,
    call_sid: String,
    direction: String,
    caller: String,
    receiver: Option<String>,
    from_number: Option<String>,
    to_number: Option<String>,
    status: String,
    duration: Option<i32>,
    price: Option<Decimal>,
    price_unit: Option<String>,
    recording_url: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    contact_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CallLogRow> for CallRecord {
    type Error = AppError;

    fn try_from(row: CallLogRow) -> Result<Self, Self::Error> {
        let direction: CallDirection = row
            .direction
            .parse()
            .map_err(|e: String| AppError::Internal(e))?;
        let status: CallStatus = row
            .status
            .parse()
            .map_err(|e: String| AppError::Internal(e))?;

        Ok(Self {
            id: row.id,
            call_sid: row.call_sid,
            direction,
            caller: row.caller,
            receiver: row.receiver,
            from_number: row.from_number,
            to_number: row.to_number,
            status,
            duration: row.duration,
            price: row.price,
            price_unit: row.price_unit,
            recording_url: row.recording_url,
            start_time: row.start_time,
            end_time: row.end_time,
            contact_id: row.contact_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
