//! Append-only audit log. The schema rejects UPDATE and DELETE.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use acervo_core::{
    decode_or_default, encode_json, new_v7, AuditLog, AuditLogRepository, Error, NewAuditLog, Page,
    Result,
};

const COLUMNS: &str = "id, user_id, organization_id, action, details, ip_address, created_at";

#[derive(Clone)]
pub struct PgAuditLogRepository {
    pool: Pool<Postgres>,
}

impl PgAuditLogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> AuditLog {
        let details: Option<String> = row.get("details");
        AuditLog {
            id: row.get("id"),
            user_id: row.get("user_id"),
            organization_id: row.get("organization_id"),
            action: row.get("action"),
            details: decode_or_default::<JsonValue>(details.as_deref(), "audit_log.details"),
            ip_address: row.get("ip_address"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository {
    async fn append(&self, entry: &NewAuditLog) -> Result<AuditLog> {
        let row = sqlx::query(&format!(
            "INSERT INTO audit_log (id, user_id, organization_id, action, details, ip_address, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        ))
        .bind(new_v7())
        .bind(entry.user_id)
        .bind(entry.organization_id)
        .bind(&entry.action)
        .bind(encode_json(&entry.details)?)
        .bind(&entry.ip_address)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(Self::parse_row(&row))
    }

    /// `None` lists across all organizations (super admin view).
    async fn list(&self, organization_id: Option<Uuid>, page: Page) -> Result<Vec<AuditLog>> {
        let page = page.clamped();
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM audit_log
             WHERE ($1::uuid IS NULL OR organization_id = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(organization_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }
}
