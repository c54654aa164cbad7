//! Read access to the audit trail.

use axum::extract::{Query, State};
use axum::Json;

use acervo_core::{AuditLog, AuditLogRepository, LegacyRole, Page};

use crate::auth::AuthUser;
use crate::{ApiError, AppState};

/// Super admins see every entry; everyone else their organization's.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<AuditLog>>, ApiError> {
    let scope = match user.role() {
        LegacyRole::SuperAdmin => None,
        _ => Some(user.organization_id()),
    };
    Ok(Json(state.db.audit.list(scope, page).await?))
}
