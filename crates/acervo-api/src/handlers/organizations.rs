//! Organization administration.
//!
//! Creation, listing and activation belong to super admins; the AI
//! configuration blob belongs to each organization's admins.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use acervo_core::{
    CreateOrganizationRequest, Organization, OrganizationConfig, OrganizationRepository, Page,
};

use super::record_audit;
use crate::guards::{RequireOrgAdmin, RequireSuperAdmin};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub async fn create_organization(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    headers: HeaderMap,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let organization = state.db.organizations.insert(&req).await?;
    record_audit(
        &state,
        &admin,
        Some(organization.id),
        "organization.created",
        json!({ "organizationId": organization.id, "slug": organization.slug }),
        &headers,
    )
    .await;
    Ok((StatusCode::CREATED, Json(organization)))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    RequireSuperAdmin(_): RequireSuperAdmin,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Organization>>, ApiError> {
    Ok(Json(state.db.organizations.list(page).await?))
}

/// Deactivating an organization locks out all of its users.
pub async fn set_organization_active(
    State(state): State<AppState>,
    RequireSuperAdmin(admin): RequireSuperAdmin,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Organization>, ApiError> {
    let organization = state.db.organizations.set_active(id, req.is_active).await?;
    record_audit(
        &state,
        &admin,
        Some(id),
        if req.is_active {
            "organization.activated"
        } else {
            "organization.deactivated"
        },
        json!({ "organizationId": id }),
        &headers,
    )
    .await;
    Ok(Json(organization))
}

pub async fn get_organization_config(
    State(state): State<AppState>,
    RequireOrgAdmin(_): RequireOrgAdmin,
    Path(org_id): Path<Uuid>,
) -> Result<Json<OrganizationConfig>, ApiError> {
    let organization = state.db.organizations.fetch(org_id).await?;
    Ok(Json(organization.config))
}

pub async fn update_organization_config(
    State(state): State<AppState>,
    RequireOrgAdmin(admin): RequireOrgAdmin,
    headers: HeaderMap,
    Path(org_id): Path<Uuid>,
    Json(config): Json<OrganizationConfig>,
) -> Result<Json<OrganizationConfig>, ApiError> {
    let organization = state
        .db
        .organizations
        .update_config(org_id, &config)
        .await?;
    record_audit(
        &state,
        &admin,
        Some(org_id),
        "organization.config_updated",
        json!({ "organizationId": org_id, "features": organization.config.features }),
        &headers,
    )
    .await;
    Ok(Json(organization.config))
}
