//! Direct submissions: an optional file plus an optional note.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::info;

use acervo_core::{
    CreateMemoryRequest, Error, Generation, GenerationBackend, ImageGenerator, MediaKind,
    MediaStore, OrganizationConfig, Result, StructuredMemory,
};

use crate::cover::{generate_cover, needs_cover};
use crate::file_strategy::{FileStrategy, MediaAttacher, MediaUpload};
use crate::postprocess::parse_structured_memory;
use crate::prompt::PromptBuilder;

#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub text_input: Option<String>,
    pub media: Option<MediaUpload>,
}

impl Submission {
    fn note(&self) -> Option<&str> {
        self.text_input
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedSubmission {
    pub memory: StructuredMemory,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub document_url: Option<String>,
    pub metadata: JsonValue,
    pub strategy: Option<FileStrategy>,
    pub generation: Generation,
}

impl ProcessedSubmission {
    /// Persistence input for the new memory.
    pub fn to_create_request(&self) -> CreateMemoryRequest {
        CreateMemoryRequest {
            title: self.memory.title.clone(),
            description: self.memory.description.clone(),
            date: self.memory.date.clone(),
            location: self.memory.location.clone(),
            tags: self.memory.tags.clone(),
            image_url: self.image_url.clone(),
            audio_url: self.audio_url.clone(),
            document_url: self.document_url.clone(),
            metadata: Some(self.metadata.clone()),
            ..Default::default()
        }
    }
}

pub struct SubmissionProcessor {
    attacher: MediaAttacher,
    backend: Arc<dyn GenerationBackend>,
    store: Arc<dyn MediaStore>,
    images: Arc<dyn ImageGenerator>,
}

impl SubmissionProcessor {
    pub fn new(
        attacher: MediaAttacher,
        backend: Arc<dyn GenerationBackend>,
        store: Arc<dyn MediaStore>,
        images: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            attacher,
            backend,
            store,
            images,
        }
    }

    /// Store the media, summarize, and synthesize a cover when needed.
    ///
    /// `folder` namespaces stored files (one per organization).
    pub async fn process(
        &self,
        submission: &Submission,
        config: &OrganizationConfig,
        folder: &str,
    ) -> Result<ProcessedSubmission> {
        if submission.note().is_none() && submission.media.is_none() {
            return Err(Error::InvalidInput(
                "textInput or media is required".to_string(),
            ));
        }

        let start = Instant::now();
        let prompts = PromptBuilder::new(config.clone());
        let kind = submission.media.as_ref().map(MediaUpload::kind);

        let mut image_url = None;
        let mut audio_url = None;
        let mut document_url = None;
        let mut video_url = None;
        let mut parts = Vec::new();
        let mut strategy = None;

        if let Some(media) = &submission.media {
            let url = self
                .store
                .store(&media.data, &media.mime_type, folder, &media.filename)
                .await?;
            match media.kind() {
                MediaKind::Image => image_url = Some(url),
                MediaKind::Audio => audio_url = Some(url),
                MediaKind::Video => video_url = Some(url),
                _ => document_url = Some(url),
            }

            let attachment = self.attacher.attach(media).await;
            strategy = attachment.strategy;
            parts = attachment.parts;
        }

        let media_attached = !parts.is_empty();
        let prompt = prompts.submission_prompt(submission.note(), parts);
        let generation = self.backend.generate(&prompt).await?;
        let memory = parse_structured_memory(&generation.text)?;

        if needs_cover(kind, image_url.is_some()) {
            image_url =
                generate_cover(self.images.as_ref(), self.store.as_ref(), &prompts, &memory, folder)
                    .await;
        }

        let mut metadata = json!({
            "source": "upload",
            "mediaAttached": media_attached,
        });
        if let Some(media) = &submission.media {
            metadata["mediaType"] = json!(media.mime_type);
            metadata["originalFilename"] = json!(media.filename);
        }
        if let Some(strategy) = strategy {
            metadata["ingestStrategy"] = json!(strategy.as_str());
        }
        if let Some(url) = video_url {
            metadata["videoUrl"] = json!(url);
        }
        if !memory.chapters.is_empty() {
            metadata["chapters"] = serde_json::to_value(&memory.chapters)?;
        }
        if let Some(transcription) = &memory.transcription {
            metadata["transcription"] = json!(transcription);
        }

        info!(
            subsystem = "ingest",
            component = "submission",
            strategy = strategy.map(|s| s.as_str()).unwrap_or("none"),
            media_attached,
            model = %generation.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "Submission processed"
        );

        Ok(ProcessedSubmission {
            memory,
            image_url,
            audio_url,
            document_url,
            metadata,
            strategy,
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PandocExtractor;
    use crate::storage::LocalMediaStore;
    use acervo_core::{PromptPart, RemoteFileState};
    use acervo_inference::mock::{MockFileApi, MockGenerationBackend, MockImageGenerator};

    const RESPONSE: &str = "```json\n{\"title\":\"Festa\",\"description\":\"d\",\"tags\":[\"festa\"]}\n```";

    struct Harness {
        processor: SubmissionProcessor,
        backend: MockGenerationBackend,
        images: MockImageGenerator,
        _dir: tempfile::TempDir,
    }

    fn harness(files: MockFileApi, backend: MockGenerationBackend) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let images = MockImageGenerator::new();
        let processor = SubmissionProcessor::new(
            MediaAttacher::new(Arc::new(files), Arc::new(PandocExtractor::new())),
            Arc::new(backend.clone()),
            Arc::new(LocalMediaStore::new(dir.path(), "http://media")),
            Arc::new(images.clone()),
        );
        Harness {
            processor,
            backend,
            images,
            _dir: dir,
        }
    }

    fn media(name: &str, mime: &str) -> MediaUpload {
        MediaUpload {
            filename: name.into(),
            mime_type: mime.into(),
            data: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_requires_text_or_media() {
        let h = harness(MockFileApi::new(), MockGenerationBackend::new());
        let err = h
            .processor
            .process(
                &Submission {
                    text_input: Some("   ".into()),
                    media: None,
                },
                &OrganizationConfig::default(),
                "org",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_text_only_submission() {
        let h = harness(MockFileApi::new(), MockGenerationBackend::new().with_fixed_response(RESPONSE));
        let out = h
            .processor
            .process(
                &Submission {
                    text_input: Some("A festa junina de 1985".into()),
                    media: None,
                },
                &OrganizationConfig::default(),
                "org",
            )
            .await
            .unwrap();
        assert_eq!(out.memory.title, "Festa");
        assert_eq!(out.strategy, None);
        assert_eq!(out.metadata["mediaAttached"], false);
        assert!(h.backend.last_call().unwrap().text_content().contains("A festa junina de 1985"));
        let req = out.to_create_request();
        assert_eq!(req.tags, vec!["festa"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_video_still_sends_text_prompt() {
        let files = MockFileApi::new().with_states(vec![RemoteFileState::Failed]);
        let h = harness(files, MockGenerationBackend::new().with_fixed_response(RESPONSE));
        let out = h
            .processor
            .process(
                &Submission {
                    text_input: Some("vídeo da procissão".into()),
                    media: Some(media("procissao.mp4", "video/mp4")),
                },
                &OrganizationConfig::default(),
                "org",
            )
            .await
            .unwrap();

        let prompt = h.backend.last_call().unwrap();
        assert!(!prompt.has_media());
        assert!(prompt.text_content().contains("vídeo da procissão"));
        assert_eq!(out.strategy, Some(FileStrategy::RemoteUpload));
        assert_eq!(out.metadata["mediaAttached"], false);
        assert!(out.metadata["videoUrl"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_small_audio_inline_with_cover() {
        let h = harness(MockFileApi::new(), MockGenerationBackend::new().with_fixed_response(RESPONSE));
        let out = h
            .processor
            .process(
                &Submission {
                    text_input: None,
                    media: Some(media("cantiga.mp3", "audio/mpeg")),
                },
                &OrganizationConfig::default(),
                "org",
            )
            .await
            .unwrap();

        let prompt = h.backend.last_call().unwrap();
        assert!(prompt
            .parts
            .iter()
            .any(|p| matches!(p, PromptPart::Inline { mime_type, .. } if mime_type == "audio/mpeg")));
        assert!(out.audio_url.is_some());
        assert!(out.image_url.as_deref().is_some_and(|u| u.ends_with("cover.png")));
        assert_eq!(h.images.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_image_submission_gets_no_cover() {
        let h = harness(MockFileApi::new(), MockGenerationBackend::new().with_fixed_response(RESPONSE));
        let out = h
            .processor
            .process(
                &Submission {
                    text_input: None,
                    media: Some(media("foto.jpg", "image/jpeg")),
                },
                &OrganizationConfig::default(),
                "org",
            )
            .await
            .unwrap();
        assert!(out.image_url.as_deref().is_some_and(|u| u.ends_with("-foto.jpg")));
        assert!(h.images.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_model_output_is_error() {
        let h = harness(MockFileApi::new(), MockGenerationBackend::new().with_fixed_response("sorry"));
        let err = h
            .processor
            .process(
                &Submission {
                    text_input: Some("x".into()),
                    media: None,
                },
                &OrganizationConfig::default(),
                "org",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
