//! AI persona repository. Agents are never hard-deleted.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use acervo_core::{new_v7, Agent, AgentRepository, CreateAgentRequest, Error, Result};

const COLUMNS: &str =
    "id, organization_id, name, role, system_prompt, icon, color, is_active, created_at";

#[derive(Clone)]
pub struct PgAgentRepository {
    pool: Pool<Postgres>,
}

impl PgAgentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> Agent {
        Agent {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            role: row.get("role"),
            system_prompt: row.get("system_prompt"),
            icon: row.get("icon"),
            color: row.get("color"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl AgentRepository for PgAgentRepository {
    async fn insert(&self, organization_id: Option<Uuid>, req: &CreateAgentRequest) -> Result<Agent> {
        if req.name.trim().is_empty() || req.system_prompt.trim().is_empty() {
            return Err(Error::InvalidInput(
                "name and systemPrompt are required".to_string(),
            ));
        }
        let row = sqlx::query(&format!(
            "INSERT INTO agent (id, organization_id, name, role, system_prompt, icon, color, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(new_v7())
        .bind(organization_id)
        .bind(req.name.trim())
        .bind(&req.role)
        .bind(&req.system_prompt)
        .bind(&req.icon)
        .bind(&req.color)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(Self::parse_row(&row))
    }

    async fn list_visible(&self, organization_id: Uuid) -> Result<Vec<Agent>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM agent
             WHERE is_active AND (organization_id IS NULL OR organization_id = $1)
             ORDER BY organization_id NULLS FIRST, name"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn fetch_visible(&self, organization_id: Uuid, id: Uuid) -> Result<Agent> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM agent
             WHERE id = $1 AND is_active AND (organization_id IS NULL OR organization_id = $2)"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Agent {}", id)))
    }

    async fn deactivate(&self, organization_id: Uuid, id: Uuid, allow_global: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE agent SET is_active = FALSE
             WHERE id = $1 AND is_active
               AND (organization_id = $2 OR ($3 AND organization_id IS NULL))",
        )
        .bind(id)
        .bind(organization_id)
        .bind(allow_global)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
