//! Daily AI usage counters, upserted additively.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use acervo_core::{AiUsage, AiUsageRepository, Error, Result, TokenUsage};

#[derive(Clone)]
pub struct PgAiUsageRepository {
    pool: Pool<Postgres>,
}

impl PgAiUsageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AiUsageRepository for PgAiUsageRepository {
    async fn record(
        &self,
        organization_id: Uuid,
        day: NaiveDate,
        model: &str,
        usage: TokenUsage,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_usage (organization_id, day, model, prompt_tokens, completion_tokens, request_count, estimated_cost)
             VALUES ($1, $2, $3, $4, $5, 1, $6)
             ON CONFLICT (organization_id, day, model) DO UPDATE SET
                prompt_tokens = ai_usage.prompt_tokens + EXCLUDED.prompt_tokens,
                completion_tokens = ai_usage.completion_tokens + EXCLUDED.completion_tokens,
                request_count = ai_usage.request_count + 1,
                estimated_cost = ai_usage.estimated_cost + EXCLUDED.estimated_cost",
        )
        .bind(organization_id)
        .bind(day)
        .bind(model)
        .bind(i64::from(usage.prompt_tokens))
        .bind(i64::from(usage.completion_tokens))
        .bind(usage.estimated_cost())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "ai_usage",
            op = "record",
            organization_id = %organization_id,
            model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "AI usage recorded"
        );
        Ok(())
    }

    async fn list(&self, organization_id: Uuid, since: NaiveDate) -> Result<Vec<AiUsage>> {
        let rows = sqlx::query(
            "SELECT organization_id, day, model, prompt_tokens, completion_tokens, request_count, estimated_cost
             FROM ai_usage
             WHERE organization_id = $1 AND day >= $2
             ORDER BY day DESC, model",
        )
        .bind(organization_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| AiUsage {
                organization_id: r.get("organization_id"),
                day: r.get("day"),
                model: r.get("model"),
                prompt_tokens: r.get("prompt_tokens"),
                completion_tokens: r.get("completion_tokens"),
                request_count: r.get("request_count"),
                estimated_cost: r.get("estimated_cost"),
            })
            .collect())
    }
}
