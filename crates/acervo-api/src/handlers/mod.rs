//! HTTP handlers, one module per resource.

pub mod agents;
pub mod ai;
pub mod audit;
pub mod auth;
pub mod lesson_plans;
pub mod memories;
pub mod organizations;
pub mod roles;
pub mod users;

use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use acervo_core::{AiUsageRepository, AuditLogRepository, Generation, NewAuditLog};

use crate::auth::AuthUser;
use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Client address from proxy headers, if present.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .map(str::to_string)
}

/// Append an audit entry. Failures are logged, never returned.
pub async fn record_audit(
    state: &AppState,
    actor: &AuthUser,
    organization_id: Option<Uuid>,
    action: &str,
    details: JsonValue,
    headers: &HeaderMap,
) {
    let entry = NewAuditLog {
        user_id: Some(actor.id()),
        organization_id,
        action: action.to_string(),
        details,
        ip_address: client_ip(headers),
    };
    if let Err(e) = state.db.audit.append(&entry).await {
        tracing::warn!(action, error = %e, "Failed to write audit log");
    }
}

/// Add one generation to the organization's daily usage counters.
pub async fn record_usage(state: &AppState, organization_id: Uuid, generation: &Generation) {
    let today = chrono::Utc::now().date_naive();
    if let Err(e) = state
        .db
        .ai_usage
        .record(organization_id, today, &generation.model, generation.usage)
        .await
    {
        tracing::warn!(
            organization_id = %organization_id,
            model = %generation.model,
            error = %e,
            "Failed to record AI usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
