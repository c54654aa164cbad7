//! Registration, login and the current-user endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value as JsonValue};

use acervo_core::{
    LegacyRole, LoginRequest, OrganizationRepository, PermissionSet, RegisterRequest,
    UserRepository,
};

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::{ApiError, AppState};

const MIN_PASSWORD_LEN: usize = 8;

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Create a user in an active organization and log it in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    validate_registration(&req)?;

    let organization = state
        .db
        .organizations
        .fetch_by_slug(req.organization_slug.trim())
        .await?;
    if !organization.is_active {
        return Err(ApiError::Forbidden("Organization is inactive".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .db
        .users
        .insert(
            organization.id,
            &req.email,
            &req.name,
            &password_hash,
            LegacyRole::User,
        )
        .await?;
    let token = issue_token(&state, user.id).await?;

    tracing::info!(
        user_id = %user.id,
        organization_id = %organization.id,
        "User registered"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "token": token })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let credentials = state
        .db
        .users
        .credentials_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &credentials.password_hash) {
        return Err(invalid());
    }

    let access = state
        .db
        .users
        .fetch_access(credentials.user_id)
        .await?
        .ok_or_else(invalid)?;
    if !access.organization_active {
        return Err(ApiError::Forbidden("Organization is inactive".to_string()));
    }

    let token = issue_token(&state, access.user.id).await?;
    Ok(Json(json!({ "user": access.user, "token": token })))
}

/// The caller, with its decoded granular permissions.
pub async fn me(user: AuthUser) -> Json<JsonValue> {
    let permissions = user
        .access
        .granular_permissions
        .as_deref()
        .map(|raw| PermissionSet::decode(raw).to_json())
        .unwrap_or_else(|| json!({}));
    Json(json!({
        "user": user.access.user,
        "permissions": permissions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, name: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            organization_slug: "olhos-dagua".into(),
            email: email.into(),
            name: name.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(validate_registration(&request("ana@acervo.test", "Ana", "12345678")).is_ok());
        assert!(validate_registration(&request("ana", "Ana", "12345678")).is_err());
        assert!(validate_registration(&request("ana@acervo.test", "  ", "12345678")).is_err());
        assert!(validate_registration(&request("ana@acervo.test", "Ana", "short")).is_err());
    }
}
