//! Agent directory implementation
//!
//! Read-only lookups joining users with their telephony agent row and the
//! organization's provider settings. The orchestration core never writes
//! these tables.

use async_trait::async_trait;
use calldesk_core::{
    models::{AgentProfile, CallReceivingDevice, ProviderCredentials},
    traits::AgentDirectory,
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of AgentDirectory
pub struct PgAgentDirectory {
    pool: PgPool,
}

impl PgAgentDirectory {
    /// Create a new agent directory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const AGENT_SELECT: &str = r#"
    SELECT u.id AS user_id,
           u.organization_id,
           u.phone,
           a.agent_number,
           a.call_receiving_device,
           s.account_sid,
           s.auth_token,
           s.api_key,
           s.api_secret,
           s.outgoing_app_sid,
           COALESCE(s.record_calls, FALSE) AS record_calls
    FROM users u
    INNER JOIN telephony_agents a ON a.user_id = u.id
    LEFT JOIN telephony_settings s ON s.organization_id = u.organization_id
"#;

#[async_trait]
impl AgentDirectory for PgAgentDirectory {
    #[instrument(skip(self))]
    async fn find_by_user_id(&self, user_id: Uuid) -> AppResult<Option<AgentProfile>> {
        let query = format!("{} WHERE u.id = $1", AGENT_SELECT);

        let row = sqlx::query_as::<sqlx::Postgres, AgentRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding agent by user id: {}", e);
                AppError::Database(format!("Failed to find agent: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_number(&self, number: &str) -> AppResult<Option<AgentProfile>> {
        let query = format!("{} WHERE a.agent_number = $1 OR u.phone = $1", AGENT_SELECT);

        let row = sqlx::query_as::<sqlx::Postgres, AgentRow>(&query)
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding agent by number: {}", e);
                AppError::Database(format!("Failed to find agent: {}", e))
            })?;

        row.map(TryInto::try_into).transpose()
    }
}

/// Helper struct for mapping the joined row to the domain model
#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    user_id: Uuid,
    organization_id: i64,
    phone: Option<String>,
    agent_number: Option<String>,
    call_receiving_device: String,
    account_sid: Option<String>,
    auth_token: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    outgoing_app_sid: Option<String>,
    record_calls: bool,
}

impl TryFrom<AgentRow> for AgentProfile {
    type Error = AppError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let device: CallReceivingDevice = row
            .call_receiving_device
            .parse()
            .map_err(|e: String| AppError::Internal(e))?;

        Ok(Self {
            user_id: row.user_id,
            organization_id: row.organization_id,
            phone: row.phone,
            agent_number: row.agent_number,
            call_receiving_device: device,
            credentials: ProviderCredentials {
                account_sid: row.account_sid,
                auth_token: row.auth_token,
                api_key: row.api_key,
                api_secret: row.api_secret,
                outgoing_app_sid: row.outgoing_app_sid,
                record_calls: row.record_calls,
            },
        })
    }
}
