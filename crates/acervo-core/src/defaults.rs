//! Centralized default constants for acervo.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default database URL for local development.
pub const DATABASE_URL: &str = "postgres://localhost/acervo";

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Maximum request body size (multipart media uploads).
pub const MAX_BODY_SIZE_BYTES: usize = 512 * 1024 * 1024;

/// Default CORS origins when `ALLOWED_ORIGINS` is unset.
pub const ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

// =============================================================================
// AUTH
// =============================================================================

/// Prefix of issued bearer tokens.
pub const TOKEN_PREFIX: &str = "ac_at_";

/// Token lifetime in hours.
pub const TOKEN_TTL_HOURS: i64 = 24 * 7;

/// Sentinel value of the legacy role that bypasses granular checks.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Hard cap on page size.
pub const PAGE_LIMIT_MAX: i64 = 200;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// INGESTION
// =============================================================================

/// Audio above this size goes through the remote file API instead of
/// being embedded inline.
pub const INLINE_AUDIO_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Interval between file-state polls while a remote video is processing.
pub const FILE_POLL_INTERVAL_SECS: u64 = 4;

/// Poll attempts before a remote video is declared not ready (~5 minutes).
pub const FILE_POLL_MAX_ATTEMPTS: u32 = 75;

/// Hard timeout on downloading remote media (thumbnails, audio, video).
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 45;

/// Timeout for local text extraction commands (pandoc).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Timeout for metadata/transcript provider requests.
pub const PROVIDER_TIMEOUT_SECS: u64 = 15;

/// Maximum transcript characters embedded in a prompt.
pub const TRANSCRIPT_MAX_CHARS: usize = 60_000;

/// Source tag attached to link-ingested memories.
pub const LINK_SOURCE_YOUTUBE: &str = "YouTube";

/// YouTube Data API v3 base.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Public YouTube site (watch pages, timedtext, oEmbed).
pub const YOUTUBE_WEB_BASE: &str = "https://www.youtube.com";

/// Caption languages tried in order.
pub const TRANSCRIPT_LANGUAGES: &[&str] = &["pt", "pt-BR", "en"];

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Gemini REST endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default text/multimodal generation model.
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default image generation model (cover synthesis).
pub const GEMINI_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Generation request timeout in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Estimated cost per million prompt tokens (USD), used for usage counters.
pub const COST_PER_MILLION_PROMPT_TOKENS: f64 = 0.10;

/// Estimated cost per million completion tokens (USD).
pub const COST_PER_MILLION_COMPLETION_TOKENS: f64 = 0.40;

// =============================================================================
// MEDIA STORAGE
// =============================================================================

/// Default local media directory when Cloudinary is not configured.
pub const MEDIA_STORAGE_PATH: &str = "/var/lib/acervo/media";

/// Public URL prefix for the local media store.
pub const MEDIA_PUBLIC_URL: &str = "http://localhost:3000/media";

/// Cloudinary upload API base.
pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

// =============================================================================
// ENVIRONMENT VARIABLE NAMES
// =============================================================================

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_GEMINI_IMAGE_MODEL: &str = "GEMINI_IMAGE_MODEL";
pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_CLOUDINARY_CLOUD_NAME: &str = "CLOUDINARY_CLOUD_NAME";
pub const ENV_CLOUDINARY_API_KEY: &str = "CLOUDINARY_API_KEY";
pub const ENV_CLOUDINARY_API_SECRET: &str = "CLOUDINARY_API_SECRET";
pub const ENV_MEDIA_STORAGE_PATH: &str = "MEDIA_STORAGE_PATH";
pub const ENV_MEDIA_PUBLIC_URL: &str = "MEDIA_PUBLIC_URL";
pub const ENV_TOKEN_TTL_HOURS: &str = "TOKEN_TTL_HOURS";
