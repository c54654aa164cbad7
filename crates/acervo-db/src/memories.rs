//! Memory repository.
//!
//! Every query is scoped by organization; owner-scoped operations add the
//! user id, so a memory belonging to someone else is simply not found.
//! Concurrent updates are last-write-wins.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use acervo_core::{
    decode_or_default, encode_json, new_v7, CreateMemoryRequest, Error, Memory, MemoryRepository,
    MemoryStatus, Page, Result, UpdateMemoryRequest,
};

const COLUMNS: &str = "id, organization_id, user_id, title, description, event_date, location, \
     category, tags, image_url, audio_url, document_url, thumbnail_url, metadata, status, \
     is_public, created_at, updated_at";

#[derive(Clone)]
pub struct PgMemoryRepository {
    pool: Pool<Postgres>,
}

impl PgMemoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> Memory {
        let tags: Option<String> = row.get("tags");
        let metadata: Option<String> = row.get("metadata");
        let status: String = row.get("status");
        Memory {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            description: row.get("description"),
            date: row.get("event_date"),
            location: row.get("location"),
            category: row.get("category"),
            tags: decode_or_default(tags.as_deref(), "memory.tags"),
            image_url: row.get("image_url"),
            audio_url: row.get("audio_url"),
            document_url: row.get("document_url"),
            thumbnail_url: row.get("thumbnail_url"),
            metadata: decode_or_default::<Option<JsonValue>>(metadata.as_deref(), "memory.metadata")
                .unwrap_or_else(|| JsonValue::Object(Default::default())),
            status: status.parse().unwrap_or_default(),
            is_public: row.get("is_public"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn not_found(id: Uuid) -> Error {
        Error::NotFound(format!("Memory {}", id))
    }
}

#[async_trait]
impl MemoryRepository for PgMemoryRepository {
    async fn insert(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        req: &CreateMemoryRequest,
    ) -> Result<Memory> {
        if req.title.trim().is_empty() {
            return Err(Error::InvalidInput("title is required".to_string()));
        }
        let id = new_v7();
        let now = Utc::now();
        let tags = encode_json(&req.tags)?;
        let metadata = encode_json(
            &req.metadata
                .clone()
                .unwrap_or_else(|| JsonValue::Object(Default::default())),
        )?;

        let row = sqlx::query(&format!(
            "INSERT INTO memory (id, organization_id, user_id, title, description, event_date,
                                 location, category, tags, image_url, audio_url, document_url,
                                 thumbnail_url, metadata, status, is_public, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(user_id)
        .bind(req.title.trim())
        .bind(&req.description)
        .bind(&req.date)
        .bind(&req.location)
        .bind(&req.category)
        .bind(&tags)
        .bind(&req.image_url)
        .bind(&req.audio_url)
        .bind(&req.document_url)
        .bind(&req.thumbnail_url)
        .bind(&metadata)
        .bind(MemoryStatus::Pending.as_str())
        .bind(req.is_public)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "memories",
            op = "insert",
            memory_id = %id,
            organization_id = %organization_id,
            "Memory created"
        );
        Ok(Self::parse_row(&row))
    }

    async fn fetch_owned(&self, organization_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Memory> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM memory WHERE id = $1 AND organization_id = $2 AND user_id = $3"
        ))
        .bind(id)
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).ok_or_else(|| Self::not_found(id))
    }

    async fn fetch_in_organization(&self, organization_id: Uuid, id: Uuid) -> Result<Memory> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM memory WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).ok_or_else(|| Self::not_found(id))
    }

    async fn list_owned(&self, organization_id: Uuid, user_id: Uuid, page: Page) -> Result<Vec<Memory>> {
        let page = page.clamped();
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM memory
             WHERE organization_id = $1 AND user_id = $2
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(organization_id)
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn update_owned(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        req: &UpdateMemoryRequest,
    ) -> Result<Memory> {
        if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("title cannot be empty".to_string()));
        }
        let tags = req.tags.as_ref().map(encode_json).transpose()?;

        let row = sqlx::query(&format!(
            "UPDATE memory SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                event_date = COALESCE($3, event_date),
                location = COALESCE($4, location),
                category = COALESCE($5, category),
                tags = COALESCE($6, tags),
                is_public = COALESCE($7, is_public),
                updated_at = $8
             WHERE id = $9 AND organization_id = $10 AND user_id = $11
             RETURNING {COLUMNS}"
        ))
        .bind(req.title.as_deref().map(str::trim))
        .bind(&req.description)
        .bind(&req.date)
        .bind(&req.location)
        .bind(&req.category)
        .bind(tags)
        .bind(req.is_public)
        .bind(Utc::now())
        .bind(id)
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).ok_or_else(|| Self::not_found(id))
    }

    async fn delete_owned(&self, organization_id: Uuid, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM memory WHERE id = $1 AND organization_id = $2 AND user_id = $3",
        )
        .bind(id)
        .bind(organization_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(&self, organization_id: Uuid, id: Uuid, status: MemoryStatus) -> Result<Memory> {
        let row = sqlx::query(&format!(
            "UPDATE memory SET status = $1, updated_at = $2
             WHERE id = $3 AND organization_id = $4
             RETURNING {COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).ok_or_else(|| Self::not_found(id))
    }
}
