//! # acervo-ingest
//!
//! Turns memory submissions into summarization prompts.
//!
//! This crate provides:
//! - File strategy selection (remote upload, text extraction, inline embed)
//! - The ordered link strategy chain (transcript, visual navigation, pure metadata)
//! - YouTube metadata, transcript and watch-page providers
//! - Prompt building from organization configuration
//! - Model output post-processing
//! - Media storage (Cloudinary or local filesystem) and cover synthesis

pub mod cover;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod file_strategy;
pub mod link;
pub mod postprocess;
pub mod prompt;
pub mod storage;
pub mod submission;
pub mod temp;
pub mod youtube;

pub use acervo_core::*;

pub use error::StrategyFailed;
pub use extract::{PandocExtractor, WordExtractor};
pub use fetch::{HttpMediaFetcher, MediaFetcher};
pub use file_strategy::{
    select_file_strategy, Attachment, FileStrategy, MediaAttacher, MediaUpload, TextSource,
};
pub use link::{
    LinkContext, LinkIngestor, LinkOutcome, LinkStrategy, PreparedPrompt, PureMetadataStrategy,
    TranscriptStrategy, VisualNavigationStrategy,
};
pub use postprocess::{parse_structured_memory, strip_code_fences, LinkMetadata};
pub use prompt::PromptBuilder;
pub use storage::{media_store_from_env, CloudinaryStore, LocalMediaStore};
pub use submission::{ProcessedSubmission, Submission, SubmissionProcessor};
pub use temp::{remove_temp_file, ScratchFile};
pub use youtube::{parse_video_id, VideoMetadata};
