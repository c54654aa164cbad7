//! AI endpoints: submission processing, link analysis, social posts and
//! usage reporting.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use acervo_core::{
    detect_mime_type, AiUsage, AiUsageRepository, GenerationBackend, Memory, MemoryRepository,
    OrganizationRepository, SocialPost, SocialPostRequest,
};
use acervo_ingest::postprocess::parse_json_object;
use acervo_ingest::{MediaUpload, PromptBuilder, Submission};

use super::record_usage;
use crate::auth::AuthUser;
use crate::guards::RequireOrgAdmin;
use crate::{ApiError, AppState};

pub const MEDIA_FIELD: &str = "media";
pub const TEXT_FIELD: &str = "textInput";
pub const SOCIAL_POSTS_FEATURE: &str = "social_posts";

const USAGE_WINDOW_DAYS: i64 = 30;

/// Storage folder for an organization's uploads.
fn media_folder(organization_slug: &str) -> String {
    format!("{}/memories", organization_slug)
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        match field.name() {
            Some(MEDIA_FIELD) => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let claimed = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                    .to_vec();
                if data.is_empty() {
                    continue;
                }
                submission.media = Some(MediaUpload {
                    mime_type: detect_mime_type(&filename, &data, &claimed),
                    filename,
                    data,
                });
            }
            Some(TEXT_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", TEXT_FIELD, e)))?;
                submission.text_input = Some(text);
            }
            _ => {}
        }
    }
    Ok(submission)
}

/// Summarize an uploaded file and/or note and persist the memory as PENDING.
pub async fn process_submission(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Json<Memory>, ApiError> {
    let submission = read_submission(multipart).await?;
    let organization = state
        .db
        .organizations
        .fetch(user.organization_id())
        .await?;

    let processed = state
        .submissions
        .process(
            &submission,
            &organization.config,
            &media_folder(&organization.slug),
        )
        .await?;
    record_usage(&state, organization.id, &processed.generation).await;

    let memory = state
        .db
        .memories
        .insert(organization.id, user.id(), &processed.to_create_request())
        .await?;
    tracing::info!(
        memory_id = %memory.id,
        organization_id = %organization.id,
        strategy = processed.strategy.map(|s| s.as_str()).unwrap_or("none"),
        "Submission stored"
    );
    Ok(Json(memory))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessLinkRequest {
    #[serde(default)]
    pub youtube_url: String,
    pub text_input: Option<String>,
}

/// Body of a recoverable failure, reported with status 200.
pub fn soft_failure(err: &acervo_core::Error) -> JsonValue {
    json!({
        "success": false,
        "message": "Could not analyze this video. Try again or add a description manually.",
        "errorDetails": err.to_string(),
    })
}

/// Analyze a video link. Returns an unsaved draft; failures past input
/// validation are soft (200 with `success: false`).
pub async fn process_link(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ProcessLinkRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let url = req.youtube_url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("youtubeUrl is required".to_string()));
    }
    let organization = state
        .db
        .organizations
        .fetch(user.organization_id())
        .await?;

    match state
        .links
        .process(url, req.text_input.as_deref(), &organization.config)
        .await
    {
        Ok(outcome) => {
            record_usage(&state, organization.id, &outcome.generation).await;
            let mut body = serde_json::to_value(&outcome)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            body["success"] = json!(true);
            Ok(Json(body))
        }
        Err(e) => {
            tracing::warn!(
                organization_id = %organization.id,
                url,
                error = %e,
                "Link analysis failed"
            );
            Ok(Json(soft_failure(&e)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SocialPostDraft {
    text: String,
    #[serde(default)]
    hashtags: Vec<String>,
}

pub async fn social_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SocialPostRequest>,
) -> Result<Json<SocialPost>, ApiError> {
    let organization = state
        .db
        .organizations
        .fetch(user.organization_id())
        .await?;
    if !organization.config.feature_enabled(SOCIAL_POSTS_FEATURE) {
        return Err(ApiError::Forbidden(
            "Social posts are disabled for this organization".to_string(),
        ));
    }
    let memory = state
        .db
        .memories
        .fetch_in_organization(organization.id, req.memory_id)
        .await?;

    let platform = req.platform.as_deref().unwrap_or("instagram");
    let tone = req.tone.as_deref().unwrap_or("warm");
    let prompt = PromptBuilder::new(organization.config).social_post_prompt(&memory, platform, tone);
    let generation = state.backend.generate(&prompt).await?;
    record_usage(&state, organization.id, &generation).await;

    let draft: SocialPostDraft = parse_json_object(&generation.text)?;
    Ok(Json(SocialPost {
        memory_id: memory.id,
        platform: platform.to_string(),
        text: draft.text,
        hashtags: draft.hashtags,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub since: Option<NaiveDate>,
}

/// Daily usage counters of the caller's organization.
pub async fn usage(
    State(state): State<AppState>,
    RequireOrgAdmin(admin): RequireOrgAdmin,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Vec<AiUsage>>, ApiError> {
    let since = query.since.unwrap_or_else(|| {
        chrono::Utc::now().date_naive() - chrono::Duration::days(USAGE_WINDOW_DAYS)
    });
    Ok(Json(
        state.db.ai_usage.list(admin.organization_id(), since).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_failure_shape() {
        let body = soft_failure(&acervo_core::Error::Inference(
            "Every link analysis strategy failed".into(),
        ));
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        assert!(body["errorDetails"]
            .as_str()
            .unwrap()
            .contains("Every link analysis strategy failed"));
    }

    #[test]
    fn test_process_link_request_accepts_camel_case() {
        let req: ProcessLinkRequest = serde_json::from_value(json!({
            "youtubeUrl": "https://youtu.be/abcdefghijk",
            "textInput": "festa"
        }))
        .unwrap();
        assert_eq!(req.youtube_url, "https://youtu.be/abcdefghijk");
        assert_eq!(req.text_input.as_deref(), Some("festa"));

        let empty: ProcessLinkRequest = serde_json::from_value(json!({})).unwrap();
        assert!(empty.youtube_url.is_empty());
    }

    #[test]
    fn test_media_folder() {
        assert_eq!(media_folder("olhos-dagua"), "olhos-dagua/memories");
    }
}
