//! Authorization guards.
//!
//! Three independent checks, applied per route:
//!
//! - [`RequireSuperAdmin`]: legacy role must be `super_admin`;
//! - [`RequireOrgAdmin`]: legacy role `admin` or `super_admin`, and an
//!   `admin` may only address its own organization through `:org_id`;
//! - [`require_permission`]: granular role check, as route middleware.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use uuid::Uuid;

use acervo_core::{Action, LegacyRole, Resource};

use crate::auth::AuthUser;
use crate::{ApiError, AppState};

/// Path parameter naming the addressed organization.
pub const ORG_ID_PARAM: &str = "org_id";

pub fn check_super_admin(role: LegacyRole) -> Result<(), ApiError> {
    if role == LegacyRole::SuperAdmin {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Super admin access required".to_string()))
    }
}

pub fn check_org_admin(
    role: LegacyRole,
    caller_org: Uuid,
    path_org: Option<Uuid>,
) -> Result<(), ApiError> {
    match role {
        LegacyRole::SuperAdmin => Ok(()),
        LegacyRole::Admin => match path_org {
            Some(org) if org != caller_org => Err(ApiError::Forbidden(
                "Access to another organization denied".to_string(),
            )),
            _ => Ok(()),
        },
        LegacyRole::User => Err(ApiError::Forbidden("Admin access required".to_string())),
    }
}

pub fn check_permission(user: &AuthUser, resource: Resource, action: Action) -> Result<(), ApiError> {
    if user.access.can(resource, action) {
        return Ok(());
    }
    tracing::debug!(
        user_id = %user.id(),
        resource = resource.as_str(),
        action = action.as_str(),
        "Permission denied"
    );
    Err(ApiError::Forbidden(format!(
        "Missing permission {}:{}",
        resource, action
    )))
}

/// Extractor: caller must be a super admin.
#[derive(Debug, Clone)]
pub struct RequireSuperAdmin(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        check_super_admin(user.role())?;
        Ok(RequireSuperAdmin(user))
    }
}

/// Extractor: caller must administer the addressed organization.
#[derive(Debug, Clone)]
pub struct RequireOrgAdmin(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireOrgAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let params = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();
        let path_org = match params.get(ORG_ID_PARAM) {
            Some(raw) => Some(
                raw.parse::<Uuid>()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid organization id: {}", raw)))?,
            ),
            None => None,
        };
        check_org_admin(user.role(), user.organization_id(), path_org)?;
        Ok(RequireOrgAdmin(user))
    }
}

/// Route middleware enforcing a granular permission.
///
/// ```rust,ignore
/// .route_layer(middleware::from_fn_with_state(
///     state.clone(),
///     require_permission(Resource::Roles, Action::Update),
/// ))
/// ```
pub fn require_permission(
    resource: Resource,
    action: Action,
) -> impl Fn(State<AppState>, Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static
{
    move |State(state): State<AppState>, request: Request, next: Next| {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let user = match AuthUser::from_request_parts(&mut parts, &state).await {
                Ok(user) => user,
                Err(e) => return e.into_response(),
            };
            if let Err(e) = check_permission(&user, resource, action) {
                return e.into_response();
            }
            next.run(Request::from_parts(parts, body)).await
        })
    }
}
