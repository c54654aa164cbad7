//! AI personas: global ones plus each organization's own.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use acervo_core::{Agent, AgentRepository, CreateAgentRequest, LegacyRole};

use super::record_audit;
use crate::auth::AuthUser;
use crate::{ApiError, AppState};

pub async fn list_agents(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Agent>>, ApiError> {
    Ok(Json(
        state.db.agents.list_visible(user.organization_id()).await?,
    ))
}

/// Only super admins may create global agents.
pub async fn create_agent(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    if req.name.trim().is_empty() || req.system_prompt.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and systemPrompt are required".to_string(),
        ));
    }
    let owner = if req.global {
        if user.role() != LegacyRole::SuperAdmin {
            return Err(ApiError::Forbidden(
                "Only super admins can create global agents".to_string(),
            ));
        }
        None
    } else {
        Some(user.organization_id())
    };

    let agent = state.db.agents.insert(owner, &req).await?;
    record_audit(
        &state,
        &user,
        owner,
        "agent.created",
        json!({ "agentId": agent.id, "name": agent.name, "global": owner.is_none() }),
        &headers,
    )
    .await;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Soft delete.
pub async fn delete_agent(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let allow_global = user.role() == LegacyRole::SuperAdmin;
    let deactivated = state
        .db
        .agents
        .deactivate(user.organization_id(), id, allow_global)
        .await?;
    if !deactivated {
        return Err(ApiError::NotFound(format!("Agent {}", id)));
    }
    record_audit(
        &state,
        &user,
        Some(user.organization_id()),
        "agent.deactivated",
        json!({ "agentId": id }),
        &headers,
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
