//! BNCC-aligned lesson plans generated from memories.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value as JsonValue;

use acervo_core::{
    AgentRepository, GenerateLessonPlanRequest, GenerationBackend, LessonPlan,
    LessonPlanRepository, MemoryRepository, OrganizationRepository, Page,
};
use acervo_ingest::postprocess::parse_json_object;
use acervo_ingest::PromptBuilder;

use super::record_usage;
use crate::auth::AuthUser;
use crate::{ApiError, AppState};

/// Feature toggle name in the organization configuration.
pub const FEATURE: &str = "lesson_plans";

pub async fn generate_lesson_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<GenerateLessonPlanRequest>,
) -> Result<(StatusCode, Json<LessonPlan>), ApiError> {
    if req.grade_level.trim().is_empty() || req.subject.trim().is_empty() || req.topic.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "gradeLevel, subject and topic are required".to_string(),
        ));
    }

    let organization = state
        .db
        .organizations
        .fetch(user.organization_id())
        .await?;
    if !organization.config.feature_enabled(FEATURE) {
        return Err(ApiError::Forbidden(
            "Lesson plans are disabled for this organization".to_string(),
        ));
    }

    let memory = match req.memory_id {
        Some(id) => Some(
            state
                .db
                .memories
                .fetch_in_organization(user.organization_id(), id)
                .await?,
        ),
        None => None,
    };
    let agent = match req.agent_id {
        Some(id) => Some(
            state
                .db
                .agents
                .fetch_visible(user.organization_id(), id)
                .await?,
        ),
        None => None,
    };

    let prompt = PromptBuilder::new(organization.config).lesson_plan_prompt(
        &req,
        memory.as_ref(),
        agent.as_ref(),
    );
    let generation = state.backend.generate(&prompt).await?;
    record_usage(&state, user.organization_id(), &generation).await;

    let content: JsonValue = parse_json_object(&generation.text)?;
    if !content.is_object() {
        return Err(ApiError::Internal(
            "Model returned a lesson plan that is not an object".to_string(),
        ));
    }

    let plan = state
        .db
        .lesson_plans
        .insert(user.organization_id(), user.id(), &req, &content)
        .await?;
    tracing::info!(
        lesson_plan_id = %plan.id,
        organization_id = %plan.organization_id,
        model = %generation.model,
        "Lesson plan generated"
    );
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn list_lesson_plans(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<Page>,
) -> Result<Json<Vec<LessonPlan>>, ApiError> {
    let plans = state
        .db
        .lesson_plans
        .list_for_user(user.organization_id(), user.id(), page)
        .await?;
    Ok(Json(plans))
}
