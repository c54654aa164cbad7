//! User repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use acervo_core::{
    new_v7, Error, LegacyRole, Page, Result, User, UserAccess, UserCredentials, UserRepository,
};

use crate::conflict_or_db;
use crate::roles::MEMBER_ROLE_SLUG;

const COLUMNS: &str = "id, organization_id, email, name, role, role_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &PgRow) -> User {
        let role: String = row.get("role");
        User {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            email: row.get("email"),
            name: row.get("name"),
            role: LegacyRole::parse(&role),
            role_id: row.get("role_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    /// New users start with the organization's member role attached.
    async fn insert(
        &self,
        organization_id: Uuid,
        email: &str,
        name: &str,
        password_hash: &str,
        role: LegacyRole,
    ) -> Result<User> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO app_user (id, organization_id, email, name, password_hash, role, role_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6,
                     (SELECT id FROM role WHERE organization_id = $2 AND slug = $7),
                     $8, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(new_v7())
        .bind(organization_id)
        .bind(normalize_email(email))
        .bind(name.trim())
        .bind(password_hash)
        .bind(role.as_str())
        .bind(MEMBER_ROLE_SLUG)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "email"))?;
        Ok(Self::parse_row(&row))
    }

    async fn fetch(&self, id: Uuid) -> Result<User> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM app_user WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    async fn credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>> {
        let row = sqlx::query("SELECT id, password_hash FROM app_user WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| UserCredentials {
            user_id: r.get("id"),
            password_hash: r.get("password_hash"),
        }))
    }

    async fn fetch_access(&self, id: Uuid) -> Result<Option<UserAccess>> {
        let start = std::time::Instant::now();
        // A role from another organization is never honoured.
        let row = sqlx::query(
            "SELECT u.id, u.organization_id, u.email, u.name, u.role, u.role_id,
                    u.created_at, u.updated_at,
                    o.is_active AS organization_active,
                    r.permissions AS granular_permissions
             FROM app_user u
             JOIN organization o ON o.id = u.organization_id
             LEFT JOIN role r ON r.id = u.role_id AND r.organization_id = u.organization_id
             WHERE u.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "users",
            op = "fetch_access",
            user_id = %id,
            found = row.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Loaded user access"
        );

        Ok(row.map(|r| UserAccess {
            user: Self::parse_row(&r),
            organization_active: r.get("organization_active"),
            granular_permissions: r.get("granular_permissions"),
        }))
    }

    async fn list_for_organization(&self, organization_id: Uuid, page: Page) -> Result<Vec<User>> {
        let page = page.clamped();
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM app_user WHERE organization_id = $1
             ORDER BY name LIMIT $2 OFFSET $3"
        ))
        .bind(organization_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn assign_role(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role_id: Option<Uuid>,
    ) -> Result<User> {
        if let Some(role_id) = role_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM role WHERE id = $1 AND organization_id = $2)",
            )
            .bind(role_id)
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
            if !exists {
                return Err(Error::NotFound(format!("Role {}", role_id)));
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE app_user SET role_id = $1, updated_at = $2
             WHERE id = $3 AND organization_id = $4
             RETURNING {COLUMNS}"
        ))
        .bind(role_id)
        .bind(Utc::now())
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))
    }
}
