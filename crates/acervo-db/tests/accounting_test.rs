//! Audit log and AI usage accounting.

use acervo_db::test_fixtures::TestTenant;
use acervo_db::{AiUsageRepository, AuditLogRepository, NewAuditLog, Page, TokenUsage};
use chrono::Utc;
use serde_json::json;

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_ai_usage_upsert_is_additive() {
    let tenant = TestTenant::new().await;
    let today = Utc::now().date_naive();

    for _ in 0..3 {
        tenant
            .db
            .ai_usage
            .record(
                tenant.id(),
                today,
                "gemini-test",
                TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                },
            )
            .await
            .unwrap();
    }

    let rows = tenant.db.ai_usage.list(tenant.id(), today).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].request_count, 3);
    assert_eq!(rows[0].prompt_tokens, 300);
    assert_eq!(rows[0].completion_tokens, 60);
    assert!(rows[0].estimated_cost > 0.0);

    tenant.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_audit_log_is_append_only() {
    let tenant = TestTenant::new().await;
    let admin = tenant.user("admin").await;

    let entry = tenant
        .db
        .audit
        .append(&NewAuditLog {
            user_id: Some(admin.id),
            organization_id: Some(tenant.id()),
            action: "role.create".into(),
            details: json!({"slug": "reader"}),
            ip_address: Some("127.0.0.1".into()),
        })
        .await
        .unwrap();

    let listed = tenant
        .db
        .audit
        .list(Some(tenant.id()), Page::default())
        .await
        .unwrap();
    assert!(listed.iter().any(|e| e.id == entry.id));

    let update = sqlx::query("UPDATE audit_log SET action = 'tampered' WHERE id = $1")
        .bind(entry.id)
        .execute(&tenant.db.pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_log WHERE id = $1")
        .bind(entry.id)
        .execute(&tenant.db.pool)
        .await;
    assert!(delete.is_err());

    tenant.cleanup().await;
}
