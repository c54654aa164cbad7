//! Granular role management within the caller's organization.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use acervo_core::{CreateRoleRequest, Role, RoleRepository, UpdateRoleRequest};

use super::record_audit;
use crate::auth::AuthUser;
use crate::{ApiError, AppState};

pub async fn list_roles(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Role>>, ApiError> {
    Ok(Json(state.db.roles.list(user.organization_id()).await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let role = state
        .db
        .roles
        .insert(user.organization_id(), &req, false)
        .await?;
    record_audit(
        &state,
        &user,
        Some(user.organization_id()),
        "role.created",
        json!({ "roleId": role.id, "slug": role.slug, "permissions": role.permissions }),
        &headers,
    )
    .await;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, ApiError> {
    let role = state
        .db
        .roles
        .update(user.organization_id(), id, &req)
        .await?;
    record_audit(
        &state,
        &user,
        Some(user.organization_id()),
        "role.updated",
        json!({ "roleId": role.id, "permissions": role.permissions }),
        &headers,
    )
    .await;
    Ok(Json(role))
}

/// System roles are refused with 403.
pub async fn delete_role(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let role = state.db.roles.fetch(user.organization_id(), id).await?;
    if role.is_system {
        return Err(ApiError::Forbidden(
            "System roles cannot be deleted".to_string(),
        ));
    }
    if !state.db.roles.delete(user.organization_id(), id).await? {
        return Err(ApiError::NotFound(format!("Role {}", id)));
    }
    record_audit(
        &state,
        &user,
        Some(user.organization_id()),
        "role.deleted",
        json!({ "roleId": id, "slug": role.slug }),
        &headers,
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
