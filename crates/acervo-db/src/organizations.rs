//! Organization (tenant) repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use acervo_core::{
    decode_or_default, encode_json, new_v7, CreateOrganizationRequest, Error, Organization,
    OrganizationConfig, OrganizationRepository, Page, Result,
};

use crate::conflict_or_db;
use crate::roles::seed_system_roles;

const COLUMNS: &str =
    "id, name, slug, primary_color, secondary_color, config, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrganizationRepository {
    pool: Pool<Postgres>,
}

impl PgOrganizationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> Organization {
        let config: Option<String> = row.get("config");
        Organization {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            primary_color: row.get("primary_color"),
            secondary_color: row.get("secondary_color"),
            config: decode_or_default::<OrganizationConfig>(config.as_deref(), "organization.config"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Slugs are lowercase ASCII letters, digits and single hyphens.
pub fn validate_slug(slug: &str) -> Result<()> {
    let valid = !slug.is_empty()
        && slug.len() <= 64
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--");
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid slug: {:?}", slug)))
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository {
    async fn insert(&self, req: &CreateOrganizationRequest) -> Result<Organization> {
        validate_slug(&req.slug)?;
        let id = new_v7();
        let now = Utc::now();
        let config = encode_json(&req.config)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "INSERT INTO organization (id, name, slug, primary_color, secondary_color, config, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(&req.name)
        .bind(&req.slug)
        .bind(&req.primary_color)
        .bind(&req.secondary_color)
        .bind(&config)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_db(e, "organization slug"))?;

        seed_system_roles(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "organizations",
            op = "insert",
            organization_id = %id,
            slug = %req.slug,
            "Organization created"
        );
        Ok(Self::parse_row(&row))
    }

    async fn fetch(&self, id: Uuid) -> Result<Organization> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM organization WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Organization {}", id)))
    }

    async fn fetch_by_slug(&self, slug: &str) -> Result<Organization> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM organization WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Organization {}", slug)))
    }

    async fn list(&self, page: Page) -> Result<Vec<Organization>> {
        let page = page.clamped();
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM organization ORDER BY name LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Organization> {
        let row = sqlx::query(&format!(
            "UPDATE organization SET is_active = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
        ))
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Organization {}", id)))
    }

    async fn update_config(&self, id: Uuid, config: &OrganizationConfig) -> Result<Organization> {
        let encoded = encode_json(config)?;
        let row = sqlx::query(&format!(
            "UPDATE organization SET config = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
        ))
        .bind(&encoded)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Organization {}", id)))
    }
}
