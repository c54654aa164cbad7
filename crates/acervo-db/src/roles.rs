//! Granular role repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use acervo_core::{
    new_v7, Action, CreateRoleRequest, Error, PermissionSet, Resource, Result, Role,
    RoleRepository, UpdateRoleRequest,
};

use crate::conflict_or_db;
use crate::organizations::validate_slug;

const COLUMNS: &str =
    "id, organization_id, name, slug, description, permissions, is_system, created_at, updated_at";

/// Slug of the seeded full-access role.
pub const ORG_ADMIN_ROLE_SLUG: &str = "org-admin";
/// Slug of the seeded default role for new members.
pub const MEMBER_ROLE_SLUG: &str = "member";

/// Roles every organization starts with.
fn system_roles() -> Vec<(&'static str, &'static str, &'static str, PermissionSet)> {
    let crud = [Action::Create, Action::Read, Action::Update, Action::Delete];
    vec![
        (
            "Administrator",
            ORG_ADMIN_ROLE_SLUG,
            "Full access within the organization",
            PermissionSet::full(),
        ),
        (
            "Member",
            MEMBER_ROLE_SLUG,
            "Contributes memories and lesson plans",
            PermissionSet::new()
                .grant(Resource::Memories, &crud)
                .grant(Resource::LessonPlans, &[Action::Create, Action::Read])
                .grant(Resource::Agents, &[Action::Read])
                .grant(Resource::Ai, &[Action::Create]),
        ),
    ]
}

/// Insert the system roles for a freshly created organization.
pub(crate) async fn seed_system_roles(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
) -> Result<()> {
    let now = Utc::now();
    for (name, slug, description, permissions) in system_roles() {
        sqlx::query(
            "INSERT INTO role (id, organization_id, name, slug, description, permissions, is_system, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)",
        )
        .bind(new_v7())
        .bind(organization_id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(permissions.to_json().to_string())
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgRoleRepository {
    pool: Pool<Postgres>,
}

impl PgRoleRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Look up a role by slug within an organization.
    pub async fn fetch_by_slug(&self, organization_id: Uuid, slug: &str) -> Result<Option<Role>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM role WHERE organization_id = $1 AND slug = $2"
        ))
        .bind(organization_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.as_ref().map(Self::parse_row))
    }

    fn parse_row(row: &PgRow) -> Role {
        let raw: String = row.get("permissions");
        Role {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            slug: row.get("slug"),
            description: row.get("description"),
            // Normalized: shows what is effectively granted.
            permissions: PermissionSet::decode(&raw).to_json(),
            is_system: row.get("is_system"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn insert(
        &self,
        organization_id: Uuid,
        req: &CreateRoleRequest,
        is_system: bool,
    ) -> Result<Role> {
        validate_slug(&req.slug)?;
        let permissions = PermissionSet::try_decode(&req.permissions)?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO role (id, organization_id, name, slug, description, permissions, is_system, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(new_v7())
        .bind(organization_id)
        .bind(&req.name)
        .bind(&req.slug)
        .bind(&req.description)
        .bind(permissions.to_json().to_string())
        .bind(is_system)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "role slug"))?;

        Ok(Self::parse_row(&row))
    }

    async fn fetch(&self, organization_id: Uuid, id: Uuid) -> Result<Role> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM role WHERE id = $1 AND organization_id = $2"
        ))
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Role {}", id)))
    }

    async fn list(&self, organization_id: Uuid) -> Result<Vec<Role>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM role WHERE organization_id = $1 ORDER BY is_system DESC, name"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        req: &UpdateRoleRequest,
    ) -> Result<Role> {
        let permissions = req
            .permissions
            .as_ref()
            .map(PermissionSet::try_decode)
            .transpose()?
            .map(|p| p.to_json().to_string());

        let row = sqlx::query(&format!(
            "UPDATE role SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                permissions = COALESCE($3, permissions),
                updated_at = $4
             WHERE id = $5 AND organization_id = $6
             RETURNING {COLUMNS}"
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(permissions)
        .bind(Utc::now())
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.as_ref()
            .map(Self::parse_row)
            .ok_or_else(|| Error::NotFound(format!("Role {}", id)))
    }

    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM role WHERE id = $1 AND organization_id = $2 AND NOT is_system",
        )
        .bind(id)
        .bind(organization_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_roles_shape() {
        let roles = system_roles();
        assert_eq!(roles.len(), 2);

        let (_, slug, _, admin) = &roles[0];
        assert_eq!(*slug, ORG_ADMIN_ROLE_SLUG);
        assert!(admin.allows(Resource::Roles, Action::Delete));

        let (_, slug, _, member) = &roles[1];
        assert_eq!(*slug, MEMBER_ROLE_SLUG);
        assert!(member.allows(Resource::Memories, Action::Create));
        assert!(!member.allows(Resource::Memories, Action::Approve));
        assert!(!member.allows(Resource::Roles, Action::Read));
    }

    #[test]
    fn test_system_role_slugs_are_valid() {
        for (_, slug, _, _) in system_roles() {
            assert!(validate_slug(slug).is_ok());
        }
    }
}
