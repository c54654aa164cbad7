//! Memory CRUD. Reads and writes are scoped to the owner within the
//! owner's organization; anything else is reported as not found.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use acervo_core::{
    CreateMemoryRequest, Memory, MemoryRepository, Page, UpdateMemoryRequest,
    UpdateMemoryStatusRequest,
};

use super::record_audit;
use crate::auth::AuthUser;
use crate::{ApiError, AppState};

pub async fn list_memories(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Memory>>, ApiError> {
    let memories = state
        .db
        .memories
        .list_owned(user.organization_id(), user.id(), page)
        .await?;
    Ok(Json(memories))
}

pub async fn create_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateMemoryRequest>,
) -> Result<(StatusCode, Json<Memory>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    let memory = state
        .db
        .memories
        .insert(user.organization_id(), user.id(), &req)
        .await?;
    Ok((StatusCode::CREATED, Json(memory)))
}

pub async fn get_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Memory>, ApiError> {
    let memory = state
        .db
        .memories
        .fetch_owned(user.organization_id(), user.id(), id)
        .await?;
    Ok(Json(memory))
}

/// Partial update. Concurrent edits are last-write-wins.
pub async fn update_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMemoryRequest>,
) -> Result<Json<Memory>, ApiError> {
    if req.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("title cannot be empty".to_string()));
    }
    let memory = state
        .db
        .memories
        .update_owned(user.organization_id(), user.id(), id, &req)
        .await?;
    Ok(Json(memory))
}

pub async fn delete_memory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .db
        .memories
        .delete_owned(user.organization_id(), user.id(), id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Memory {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Moderate a memory of the caller's organization (`memories:approve`).
pub async fn update_memory_status(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMemoryStatusRequest>,
) -> Result<Json<Memory>, ApiError> {
    let memory = state
        .db
        .memories
        .set_status(user.organization_id(), id, req.status)
        .await?;
    record_audit(
        &state,
        &user,
        Some(user.organization_id()),
        "memory.status_changed",
        json!({ "memoryId": id, "status": req.status }),
        &headers,
    )
    .await;
    Ok(Json(memory))
}
