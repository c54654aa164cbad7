//! Organization members and their granular roles.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use acervo_core::{AssignRoleRequest, Page, User, UserRepository};

use super::record_audit;
use crate::auth::AuthUser;
use crate::{ApiError, AppState};

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state
        .db
        .users
        .list_for_organization(user.organization_id(), page)
        .await?;
    Ok(Json(users))
}

/// Attach a role of the caller's organization, or detach with `roleId: null`.
pub async fn assign_user_role(
    State(state): State<AppState>,
    actor: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .db
        .users
        .assign_role(actor.organization_id(), user_id, req.role_id)
        .await?;
    record_audit(
        &state,
        &actor,
        Some(actor.organization_id()),
        "user.role_assigned",
        json!({ "userId": user_id, "roleId": req.role_id }),
        &headers,
    )
    .await;
    Ok(Json(user))
}
