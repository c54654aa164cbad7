//! Core traits for acervo abstractions.
//!
//! Repositories are implemented over PostgreSQL in `acervo-db`; the AI,
//! file and storage seams are implemented in `acervo-inference` and
//! `acervo-ingest` and injected into the API as `Arc<dyn Trait>`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn insert(&self, req: &CreateOrganizationRequest) -> Result<Organization>;
    async fn fetch(&self, id: Uuid) -> Result<Organization>;
    async fn fetch_by_slug(&self, slug: &str) -> Result<Organization>;
    async fn list(&self, page: Page) -> Result<Vec<Organization>>;
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Organization>;
    async fn update_config(&self, id: Uuid, config: &OrganizationConfig) -> Result<Organization>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(
        &self,
        organization_id: Uuid,
        email: &str,
        name: &str,
        password_hash: &str,
        role: LegacyRole,
    ) -> Result<User>;
    async fn fetch(&self, id: Uuid) -> Result<User>;
    async fn credentials_by_email(&self, email: &str) -> Result<Option<UserCredentials>>;
    /// Load the user with its granular role and organization state.
    async fn fetch_access(&self, id: Uuid) -> Result<Option<UserAccess>>;
    async fn list_for_organization(&self, organization_id: Uuid, page: Page) -> Result<Vec<User>>;
    /// Attach (or detach with `None`) a granular role of the same organization.
    async fn assign_role(&self, organization_id: Uuid, user_id: Uuid, role_id: Option<Uuid>) -> Result<User>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn insert(&self, organization_id: Uuid, req: &CreateRoleRequest, is_system: bool) -> Result<Role>;
    /// Fetch a role within an organization; other tenants' roles are not found.
    async fn fetch(&self, organization_id: Uuid, id: Uuid) -> Result<Role>;
    async fn list(&self, organization_id: Uuid) -> Result<Vec<Role>>;
    async fn update(&self, organization_id: Uuid, id: Uuid, req: &UpdateRoleRequest) -> Result<Role>;
    /// Delete a non-system role. Returns false when nothing was deleted.
    async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn insert(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        req: &CreateMemoryRequest,
    ) -> Result<Memory>;
    /// Fetch a memory visible to `user_id` (owner within the organization).
    async fn fetch_owned(&self, organization_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Memory>;
    async fn fetch_in_organization(&self, organization_id: Uuid, id: Uuid) -> Result<Memory>;
    async fn list_owned(&self, organization_id: Uuid, user_id: Uuid, page: Page) -> Result<Vec<Memory>>;
    async fn update_owned(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        req: &UpdateMemoryRequest,
    ) -> Result<Memory>;
    async fn delete_owned(&self, organization_id: Uuid, user_id: Uuid, id: Uuid) -> Result<bool>;
    async fn set_status(&self, organization_id: Uuid, id: Uuid, status: MemoryStatus) -> Result<Memory>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn insert(&self, organization_id: Option<Uuid>, req: &CreateAgentRequest) -> Result<Agent>;
    /// Active global agents plus the organization's own.
    async fn list_visible(&self, organization_id: Uuid) -> Result<Vec<Agent>>;
    async fn fetch_visible(&self, organization_id: Uuid, id: Uuid) -> Result<Agent>;
    /// Soft delete. Global agents are only deactivated when `allow_global`.
    async fn deactivate(&self, organization_id: Uuid, id: Uuid, allow_global: bool) -> Result<bool>;
}

#[async_trait]
pub trait LessonPlanRepository: Send + Sync {
    async fn insert(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        req: &GenerateLessonPlanRequest,
        content: &JsonValue,
    ) -> Result<LessonPlan>;
    async fn list_for_user(&self, organization_id: Uuid, user_id: Uuid, page: Page) -> Result<Vec<LessonPlan>>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, entry: &NewAuditLog) -> Result<AuditLog>;
    async fn list(&self, organization_id: Option<Uuid>, page: Page) -> Result<Vec<AuditLog>>;
}

#[async_trait]
pub trait AiUsageRepository: Send + Sync {
    /// Add one request's counters to the (organization, day, model) row.
    async fn record(&self, organization_id: Uuid, day: NaiveDate, model: &str, usage: TokenUsage) -> Result<()>;
    async fn list(&self, organization_id: Uuid, since: NaiveDate) -> Result<Vec<AiUsage>>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<()>;
    /// Resolve a non-expired token digest to its user.
    async fn user_for_token(&self, token_hash: &str) -> Result<Option<Uuid>>;
    async fn purge_expired(&self) -> Result<u64>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// One part of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    /// Raw bytes sent base64-encoded in the request body.
    Inline { mime_type: String, data: Vec<u8> },
    /// Reference to a file previously uploaded to the file API.
    File { mime_type: String, uri: String },
}

/// A generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub parts: Vec<PromptPart>,
    /// Ask the model for a JSON response.
    pub json_output: bool,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![PromptPart::Text(text.into())],
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_part(mut self, part: PromptPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }

    /// Concatenated text parts, in order.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_media(&self) -> bool {
        self.parts.iter().any(|p| !matches!(p, PromptPart::Text(_)))
    }
}

/// Model output plus accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Backend for text generation over multimodal prompts.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<Generation>;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;

    fn model_name(&self) -> &str;
}

/// Processing state of a remotely uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFileState {
    Processing,
    Active,
    Failed,
    Unspecified,
}

impl RemoteFileState {
    pub fn parse(s: &str) -> Self {
        match s {
            "PROCESSING" => RemoteFileState::Processing,
            "ACTIVE" => RemoteFileState::Active,
            "FAILED" => RemoteFileState::Failed,
            _ => RemoteFileState::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Provider resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: RemoteFileState,
}

/// Upload-then-reference file API of the AI provider.
#[async_trait]
pub trait FileApi: Send + Sync {
    async fn upload(&self, data: &[u8], mime_type: &str, display_name: &str) -> Result<RemoteFile>;

    /// Fetch the current state of an uploaded file.
    async fn get(&self, name: &str) -> Result<RemoteFile>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Text-to-image generation, used for cover art.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage>;
}

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// Object storage for user media. Returns a public URL.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, data: &[u8], mime_type: &str, folder: &str, filename: &str) -> Result<String>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::text("hello")
            .with_system("sys")
            .with_part(PromptPart::Inline {
                mime_type: "image/png".into(),
                data: vec![1, 2],
            })
            .with_part(PromptPart::Text("world".into()))
            .json();
        assert_eq!(prompt.system.as_deref(), Some("sys"));
        assert!(prompt.json_output);
        assert!(prompt.has_media());
        assert_eq!(prompt.text_content(), "hello\nworld");
    }

    #[test]
    fn test_remote_file_state_parse() {
        assert_eq!(RemoteFileState::parse("ACTIVE"), RemoteFileState::Active);
        assert_eq!(RemoteFileState::parse("FAILED"), RemoteFileState::Failed);
        assert_eq!(RemoteFileState::parse("PROCESSING"), RemoteFileState::Processing);
        assert_eq!(RemoteFileState::parse("STATE_UNSPECIFIED"), RemoteFileState::Unspecified);
    }
}
