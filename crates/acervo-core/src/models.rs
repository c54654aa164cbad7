//! Core data models for acervo.
//!
//! Entities serialize in camelCase, the shape the web client consumes.
//! JSON blobs stored in text columns (tags, permissions, configuration,
//! metadata) are decoded into typed fields by the repositories.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};
use crate::rbac::{self, Action, Resource};

// =============================================================================
// ORGANIZATIONS
// =============================================================================

/// Per-organization AI configuration, stored as a JSON blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationConfig {
    #[serde(alias = "aiInstructions")]
    pub ai_instructions: Option<String>,
    pub guardrails: Option<String>,
    #[serde(alias = "culturalContext")]
    pub cultural_context: Option<String>,
    /// Feature toggles (e.g. `lesson_plans`, `social_posts`).
    pub features: HashMap<String, bool>,
}

impl OrganizationConfig {
    /// Features are enabled unless explicitly switched off.
    pub fn feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub config: OrganizationConfig,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    #[serde(default)]
    pub config: OrganizationConfig,
}

// =============================================================================
// USERS
// =============================================================================

/// Coarse role stored directly on the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRole {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl LegacyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyRole::User => "user",
            LegacyRole::Admin => "admin",
            LegacyRole::SuperAdmin => defaults::SUPER_ADMIN_ROLE,
        }
    }

    /// Parse a stored role. Unknown values degrade to the least privileged role.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => LegacyRole::Admin,
            defaults::SUPER_ADMIN_ROLE => LegacyRole::SuperAdmin,
            _ => LegacyRole::User,
        }
    }

    pub fn is_org_admin(&self) -> bool {
        matches!(self, LegacyRole::Admin | LegacyRole::SuperAdmin)
    }
}

impl fmt::Display for LegacyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: LegacyRole,
    pub role_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to authorize a request for one user.
#[derive(Debug, Clone)]
pub struct UserAccess {
    pub user: User,
    pub organization_active: bool,
    /// Raw permission text of the attached granular role, if any.
    pub granular_permissions: Option<String>,
}

impl UserAccess {
    pub fn can(&self, resource: Resource, action: Action) -> bool {
        rbac::authorize(
            self.user.role,
            self.granular_permissions.as_deref(),
            resource,
            action,
        )
    }
}

/// Credentials row used only by login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub organization_slug: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    /// `None` detaches the granular role.
    pub role_id: Option<Uuid>,
}

// =============================================================================
// ROLES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// `{resource: [action, ...]}`
    pub permissions: JsonValue,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub permissions: JsonValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<JsonValue>,
}

// =============================================================================
// MEMORIES
// =============================================================================

/// Moderation state of a memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Pending => "PENDING",
            MemoryStatus::Approved => "APPROVED",
            MemoryStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(MemoryStatus::Pending),
            "APPROVED" => Ok(MemoryStatus::Approved),
            "REJECTED" => Ok(MemoryStatus::Rejected),
            _ => Err(Error::InvalidInput(format!("Invalid memory status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub document_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata: JsonValue,
    pub status: MemoryStatus,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub document_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata: Option<JsonValue>,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemoryRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMemoryStatusRequest {
    pub status: MemoryStatus,
}

/// Chapter marker inferred by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(alias = "timestamp", alias = "start")]
    pub time: String,
    #[serde(alias = "label")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Structured output the summarizer is asked to produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredMemory {
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<Chapter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

/// Which link strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Transcript,
    MultimodalVisual,
    MetadataOnly,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Transcript => "transcript",
            AnalysisType::MultimodalVisual => "multimodal_visual",
            AnalysisType::MetadataOnly => "metadata_only",
        }
    }
}

// =============================================================================
// AGENTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: Uuid,
    /// `None` for global agents.
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub role: String,
    pub system_prompt: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub role: String,
    pub system_prompt: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    /// Only honoured for super admins.
    #[serde(default)]
    pub global: bool,
}

// =============================================================================
// LESSON PLANS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub memory_id: Option<Uuid>,
    pub grade_level: String,
    pub subject: String,
    pub topic: String,
    pub content: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLessonPlanRequest {
    pub memory_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub grade_level: String,
    pub subject: String,
    pub topic: String,
    pub duration_minutes: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPostRequest {
    pub memory_id: Uuid,
    pub platform: Option<String>,
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub memory_id: Uuid,
    pub platform: String,
    pub text: String,
    pub hashtags: Vec<String>,
}

// =============================================================================
// AUDIT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub action: String,
    pub details: JsonValue,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub user_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub action: String,
    pub details: JsonValue,
    pub ip_address: Option<String>,
}

// =============================================================================
// AI USAGE
// =============================================================================

/// Token counts reported by one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn estimated_cost(&self) -> f64 {
        (self.prompt_tokens as f64 * defaults::COST_PER_MILLION_PROMPT_TOKENS
            + self.completion_tokens as f64 * defaults::COST_PER_MILLION_COMPLETION_TOKENS)
            / 1_000_000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiUsage {
    pub organization_id: Uuid,
    pub day: NaiveDate,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub request_count: i64,
    pub estimated_cost: f64,
}

// =============================================================================
// TOKENS
// =============================================================================

/// Bearer token handed to a client at login. Only its digest is stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Pagination shared by list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    defaults::PAGE_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: defaults::PAGE_LIMIT,
            offset: defaults::PAGE_OFFSET,
        }
    }
}

impl Page {
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, defaults::PAGE_LIMIT_MAX),
            offset: self.offset.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_role_parse() {
        assert_eq!(LegacyRole::parse("super_admin"), LegacyRole::SuperAdmin);
        assert_eq!(LegacyRole::parse("ADMIN"), LegacyRole::Admin);
        assert_eq!(LegacyRole::parse("user"), LegacyRole::User);
        assert_eq!(LegacyRole::parse("root"), LegacyRole::User);
    }

    #[test]
    fn test_memory_status_wire_format() {
        assert_eq!(
            serde_json::to_value(MemoryStatus::Approved).unwrap(),
            json!("APPROVED")
        );
        assert_eq!("rejected".parse::<MemoryStatus>().unwrap(), MemoryStatus::Rejected);
        assert!("ARCHIVED".parse::<MemoryStatus>().is_err());
    }

    #[test]
    fn test_structured_memory_tolerates_missing_fields() {
        let parsed: StructuredMemory =
            serde_json::from_value(json!({"title": "Festa junina", "tags": ["festa"]})).unwrap();
        assert_eq!(parsed.title, "Festa junina");
        assert!(parsed.description.is_empty());
        assert!(parsed.chapters.is_empty());
    }

    #[test]
    fn test_chapter_aliases() {
        let ch: Chapter =
            serde_json::from_value(json!({"timestamp": "01:20", "label": "Abertura"})).unwrap();
        assert_eq!(ch.time, "01:20");
        assert_eq!(ch.title, "Abertura");
    }

    #[test]
    fn test_organization_config_accepts_camel_case() {
        let cfg: OrganizationConfig =
            serde_json::from_value(json!({"aiInstructions": "Be kind", "features": {"lesson_plans": false}}))
                .unwrap();
        assert_eq!(cfg.ai_instructions.as_deref(), Some("Be kind"));
        assert!(!cfg.feature_enabled("lesson_plans"));
        assert!(cfg.feature_enabled("social_posts"));
    }

    #[test]
    fn test_token_usage_cost() {
        let usage = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 1_000_000,
        };
        let expected = defaults::COST_PER_MILLION_PROMPT_TOKENS
            + defaults::COST_PER_MILLION_COMPLETION_TOKENS;
        assert!((usage.estimated_cost() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_page_clamped() {
        let page = Page {
            limit: 10_000,
            offset: -4,
        }
        .clamped();
        assert_eq!(page.limit, defaults::PAGE_LIMIT_MAX);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn test_user_access_delegates_to_resolver() {
        let now = Utc::now();
        let access = UserAccess {
            user: User {
                id: Uuid::nil(),
                organization_id: Uuid::nil(),
                email: "a@b.c".into(),
                name: "A".into(),
                role: LegacyRole::User,
                role_id: Some(Uuid::nil()),
                created_at: now,
                updated_at: now,
            },
            organization_active: true,
            granular_permissions: Some(r#"{"memories": ["read"]}"#.into()),
        };
        assert!(access.can(Resource::Memories, Action::Read));
        assert!(!access.can(Resource::Memories, Action::Delete));
    }
}
