//! Bearer token storage. Only SHA-256 digests of tokens are persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres};
use tracing::info;
use uuid::Uuid;

use acervo_core::{new_v7, Error, Result, TokenRepository};

/// Hex SHA-256 digest of a raw token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct PgTokenRepository {
    pool: Pool<Postgres>,
}

impl PgTokenRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn insert(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO api_token (id, user_id, token_hash, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(new_v7())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<Uuid>> {
        sqlx::query_scalar(
            "SELECT user_id FROM api_token WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM api_token WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        let purged = result.rows_affected();
        if purged > 0 {
            info!(
                subsystem = "database",
                component = "tokens",
                op = "purge_expired",
                purged,
                "Expired tokens purged"
            );
        }
        Ok(purged)
    }
}
