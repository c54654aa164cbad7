//! Tenant isolation and ownership rules over a live database.

use acervo_db::test_fixtures::TestTenant;
use acervo_db::{
    Action, CreateMemoryRequest, CreateRoleRequest, Error, MemoryRepository, MemoryStatus, Page,
    Resource, RoleRepository, UpdateMemoryRequest, UserRepository,
};
use serde_json::json;

fn memory(title: &str) -> CreateMemoryRequest {
    CreateMemoryRequest {
        title: title.to_string(),
        description: "Descrição".to_string(),
        tags: vec!["festa".to_string(), "bairro".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_memory_insert_then_list_round_trip() {
    let tenant = TestTenant::new().await;
    let user = tenant.user("ana").await;

    let created = tenant
        .db
        .memories
        .insert(tenant.id(), user.id, &memory("Festa junina de 1985"))
        .await
        .unwrap();
    assert_eq!(created.status, MemoryStatus::Pending);

    let listed = tenant
        .db
        .memories
        .list_owned(tenant.id(), user.id, Page::default())
        .await
        .unwrap();
    let found = listed.iter().find(|m| m.id == created.id).unwrap();
    assert_eq!(found.title, "Festa junina de 1985");
    assert_eq!(found.description, "Descrição");
    assert_eq!(found.tags, vec!["festa", "bairro"]);

    tenant.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_non_owner_sees_not_found() {
    let tenant = TestTenant::new().await;
    let owner = tenant.user("owner").await;
    let other = tenant.user("other").await;

    let created = tenant
        .db
        .memories
        .insert(tenant.id(), owner.id, &memory("Mine"))
        .await
        .unwrap();

    let err = tenant
        .db
        .memories
        .fetch_owned(tenant.id(), other.id, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = tenant
        .db
        .memories
        .update_owned(
            tenant.id(),
            other.id,
            created.id,
            &UpdateMemoryRequest {
                title: Some("Stolen".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let deleted = tenant
        .db
        .memories
        .delete_owned(tenant.id(), other.id, created.id)
        .await
        .unwrap();
    assert!(!deleted);

    tenant.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_cross_tenant_memory_is_not_found() {
    let a = TestTenant::new().await;
    let b = TestTenant::new().await;
    let user = a.user("ana").await;

    let created = a
        .db
        .memories
        .insert(a.id(), user.id, &memory("Tenant A"))
        .await
        .unwrap();

    let err = b
        .db
        .memories
        .fetch_in_organization(b.id(), created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    a.cleanup().await;
    b.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_granular_role_drives_access() {
    let tenant = TestTenant::new().await;
    let user = tenant.user("reader").await;

    let role = tenant
        .db
        .roles
        .insert(
            tenant.id(),
            &CreateRoleRequest {
                name: "Reader".into(),
                slug: "reader".into(),
                description: None,
                permissions: json!({"memories": ["read"]}),
            },
            false,
        )
        .await
        .unwrap();
    tenant
        .db
        .users
        .assign_role(tenant.id(), user.id, Some(role.id))
        .await
        .unwrap();

    let access = tenant.db.users.fetch_access(user.id).await.unwrap().unwrap();
    assert!(access.organization_active);
    assert!(access.can(Resource::Memories, Action::Read));
    assert!(!access.can(Resource::Memories, Action::Delete));
    assert!(!access.can(Resource::Users, Action::Read));

    tenant
        .db
        .users
        .assign_role(tenant.id(), user.id, None)
        .await
        .unwrap();
    let access = tenant.db.users.fetch_access(user.id).await.unwrap().unwrap();
    assert!(!access.can(Resource::Memories, Action::Read));

    tenant.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_foreign_role_cannot_be_assigned() {
    let a = TestTenant::new().await;
    let b = TestTenant::new().await;
    let user = a.user("ana").await;

    let foreign = b.db.roles.list(b.id()).await.unwrap();
    let err = a
        .db
        .users
        .assign_role(a.id(), user.id, Some(foreign[0].id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    a.cleanup().await;
    b.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_system_roles_cannot_be_deleted() {
    let tenant = TestTenant::new().await;
    let roles = tenant.db.roles.list(tenant.id()).await.unwrap();
    let system = roles.iter().find(|r| r.is_system).unwrap();

    let deleted = tenant.db.roles.delete(tenant.id(), system.id).await.unwrap();
    assert!(!deleted);
    assert!(tenant.db.roles.fetch(tenant.id(), system.id).await.is_ok());

    tenant.cleanup().await;
}
