//! Lesson plan repository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use acervo_core::{
    decode_or_default, encode_json, new_v7, Error, GenerateLessonPlanRequest, LessonPlan,
    LessonPlanRepository, Page, Result,
};

const COLUMNS: &str =
    "id, organization_id, user_id, memory_id, grade_level, subject, topic, content, created_at";

#[derive(Clone)]
pub struct PgLessonPlanRepository {
    pool: Pool<Postgres>,
}

impl PgLessonPlanRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> LessonPlan {
        let content: Option<String> = row.get("content");
        LessonPlan {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            user_id: row.get("user_id"),
            memory_id: row.get("memory_id"),
            grade_level: row.get("grade_level"),
            subject: row.get("subject"),
            topic: row.get("topic"),
            content: decode_or_default::<JsonValue>(content.as_deref(), "lesson_plan.content"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl LessonPlanRepository for PgLessonPlanRepository {
    async fn insert(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        req: &GenerateLessonPlanRequest,
        content: &JsonValue,
    ) -> Result<LessonPlan> {
        let row = sqlx::query(&format!(
            "INSERT INTO lesson_plan (id, organization_id, user_id, memory_id, grade_level, subject, topic, content, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        ))
        .bind(new_v7())
        .bind(organization_id)
        .bind(user_id)
        .bind(req.memory_id)
        .bind(&req.grade_level)
        .bind(&req.subject)
        .bind(&req.topic)
        .bind(encode_json(content)?)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(Self::parse_row(&row))
    }

    async fn list_for_user(&self, organization_id: Uuid, user_id: Uuid, page: Page) -> Result<Vec<LessonPlan>> {
        let page = page.clamped();
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM lesson_plan
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
}
