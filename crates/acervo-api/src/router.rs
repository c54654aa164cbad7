//! Route table and middleware stack.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use acervo_core::defaults;
use acervo_core::rbac::{Action, Resource};

use crate::guards::require_permission;
use crate::handlers::{
    agents, ai, audit, auth, health_check, lesson_plans, memories, organizations, roles, users,
};
use crate::middleware::{cors_layer, parse_allowed_origins, rate_limit_middleware, MakeRequestUuidV7};
use crate::AppState;

/// Build the full application router.
///
/// CORS origins come from `ALLOWED_ORIGINS`.
pub fn build_router(state: AppState) -> Router {
    let origins = parse_allowed_origins(std::env::var("ALLOWED_ORIGINS").ok().as_deref());
    build_router_with_origins(state, origins)
}

pub fn build_router_with_origins(
    state: AppState,
    origins: Vec<axum::http::HeaderValue>,
) -> Router {
    let permit =
        |resource, action| middleware::from_fn_with_state(state.clone(), require_permission(resource, action));

    let api = Router::new()
        .route("/health", get(health_check))
        // Authentication
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // AI
        .route(
            "/api/ai/process",
            post(ai::process_submission).route_layer(permit(Resource::Ai, Action::Create)),
        )
        .route(
            "/api/ai/process-link",
            post(ai::process_link).route_layer(permit(Resource::Ai, Action::Create)),
        )
        .route(
            "/api/ai/social-post",
            post(ai::social_post).route_layer(permit(Resource::Ai, Action::Create)),
        )
        .route("/api/ai/usage", get(ai::usage))
        // Memories (owner scoped)
        .route(
            "/api/memories",
            get(memories::list_memories).post(memories::create_memory),
        )
        .route(
            "/api/memories/:id",
            get(memories::get_memory)
                .put(memories::update_memory)
                .delete(memories::delete_memory),
        )
        .route(
            "/api/memories/:id/status",
            patch(memories::update_memory_status)
                .route_layer(permit(Resource::Memories, Action::Approve)),
        )
        // Roles
        .route(
            "/api/roles",
            get(roles::list_roles)
                .route_layer(permit(Resource::Roles, Action::Read))
                .merge(post(roles::create_role).route_layer(permit(Resource::Roles, Action::Create))),
        )
        .route(
            "/api/roles/:id",
            put(roles::update_role)
                .route_layer(permit(Resource::Roles, Action::Update))
                .merge(delete(roles::delete_role).route_layer(permit(Resource::Roles, Action::Delete))),
        )
        // Users
        .route(
            "/api/users",
            get(users::list_users).route_layer(permit(Resource::Users, Action::Read)),
        )
        .route(
            "/api/users/:id/role",
            put(users::assign_user_role).route_layer(permit(Resource::Users, Action::Update)),
        )
        // Organizations
        .route(
            "/api/admin/organizations",
            post(organizations::create_organization).get(organizations::list_organizations),
        )
        .route(
            "/api/admin/organizations/:id/active",
            patch(organizations::set_organization_active),
        )
        .route(
            "/api/organizations/:org_id/config",
            get(organizations::get_organization_config)
                .put(organizations::update_organization_config),
        )
        // Agents
        .route(
            "/api/agents",
            get(agents::list_agents)
                .route_layer(permit(Resource::Agents, Action::Read))
                .merge(post(agents::create_agent).route_layer(permit(Resource::Agents, Action::Create))),
        )
        .route(
            "/api/agents/:id",
            delete(agents::delete_agent).route_layer(permit(Resource::Agents, Action::Delete)),
        )
        // Lesson plans
        .route(
            "/api/lesson-plans",
            get(lesson_plans::list_lesson_plans)
                .route_layer(permit(Resource::LessonPlans, Action::Read)),
        )
        .route(
            "/api/lesson-plans/generate",
            post(lesson_plans::generate_lesson_plan)
                .route_layer(permit(Resource::LessonPlans, Action::Create)),
        )
        // Audit
        .route(
            "/api/audit-logs",
            get(audit::list_audit_logs).route_layer(permit(Resource::AuditLogs, Action::Read)),
        );

    api.layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit_middleware,
    ))
    .layer(TraceLayer::new_for_http())
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
    .layer(cors_layer(origins))
    .layer(CatchPanicLayer::new())
    // Media uploads go through multipart, which has its own default cap.
    .layer(DefaultBodyLimit::max(defaults::MAX_BODY_SIZE_BYTES))
    .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
    .with_state(state)
}
