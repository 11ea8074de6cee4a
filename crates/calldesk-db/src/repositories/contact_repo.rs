//! Contact and lead lookup implementation
//!
//! Read-only correlation lookups: an incoming caller's number is matched
//! against contacts, and the contact's company against open leads.

use async_trait::async_trait;
use calldesk_core::{
    models::{Contact, Lead},
    traits::ContactRepository,
    AppError, AppResult,
};
use sqlx::PgPool;
use tracing::{error, instrument};

/// PostgreSQL implementation of ContactRepository
pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    /// Create a new contact repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    #[instrument(skip(self))]
    async fn find_by_phone(
        &self,
        organization_id: i64,
        number: &str,
    ) -> AppResult<Option<Contact>> {
        let contact = sqlx::query_as::<sqlx::Postgres, ContactRow>(
            r#"
            SELECT id, organization_id, company_id, mobile_phone
            FROM contacts
            WHERE organization_id = $1 AND mobile_phone = $2
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding contact by phone: {}", e);
            AppError::Database(format!("Failed to find contact: {}", e))
        })?;

        Ok(contact.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_lead_for_company(
        &self,
        organization_id: i64,
        company_id: i64,
    ) -> AppResult<Option<Lead>> {
        let lead = sqlx::query_as::<sqlx::Postgres, LeadRow>(
            r#"
            SELECT id, organization_id, company_id
            FROM leads
            WHERE organization_id = $1 AND company_id = $2
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding lead: {}", e);
            AppError::Database(format!("Failed to find lead: {}", e))
        })?;

        Ok(lead.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: i64,
    organization_id: i64,
    company_id: Option<i64>,
    mobile_phone: Option<String>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            company_id: row.company_id,
            mobile_phone: row.mobile_phone,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LeadRow {
    id: i64,
    organization_id: i64,
    company_id: Option<i64>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            company_id: row.company_id,
        }
    }
}
