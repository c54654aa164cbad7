//! File strategy selection and execution.
//!
//! | Condition                         | Strategy        |
//! |-----------------------------------|-----------------|
//! | audio > 5 MB, any video, or PDF   | remote upload   |
//! | Word document                     | text extraction |
//! | plain text                        | text extraction |
//! | image or small audio              | inline embed    |
//!
//! Execution never fails the request: a failing strategy yields no media
//! and the prompt goes out text-only.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use acervo_core::defaults::INLINE_AUDIO_MAX_BYTES;
use acervo_core::{FileApi, MediaKind, PromptPart};
use acervo_inference::{wait_until_active, PollPolicy};

use crate::error::StrategyFailed;
use crate::extract::{decode_plain_text, WordExtractor};
use crate::prompt::document_block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Word,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStrategy {
    RemoteUpload,
    TextExtraction(TextSource),
    InlineEmbed,
}

impl FileStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStrategy::RemoteUpload => "remote_upload",
            FileStrategy::TextExtraction(_) => "text_extraction",
            FileStrategy::InlineEmbed => "inline_embed",
        }
    }
}

/// Pick the strategy for an upload. `None` for unsupported types.
pub fn select_file_strategy(mime_type: &str, size_bytes: u64) -> Option<FileStrategy> {
    match MediaKind::from_mime(mime_type) {
        MediaKind::Audio if size_bytes > INLINE_AUDIO_MAX_BYTES => Some(FileStrategy::RemoteUpload),
        MediaKind::Video | MediaKind::Pdf => Some(FileStrategy::RemoteUpload),
        MediaKind::WordDocument => Some(FileStrategy::TextExtraction(TextSource::Word)),
        MediaKind::PlainText => Some(FileStrategy::TextExtraction(TextSource::Plain)),
        MediaKind::Image | MediaKind::Audio => Some(FileStrategy::InlineEmbed),
        MediaKind::Other => None,
    }
}

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaUpload {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Result of running the file strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub strategy: Option<FileStrategy>,
    /// Empty when the strategy failed or none applied.
    pub parts: Vec<PromptPart>,
}

impl Attachment {
    fn none(strategy: Option<FileStrategy>) -> Self {
        Self {
            strategy,
            parts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Runs the selected strategy and turns the upload into prompt parts.
pub struct MediaAttacher {
    files: Arc<dyn FileApi>,
    word: Arc<dyn WordExtractor>,
    poll: PollPolicy,
}

impl MediaAttacher {
    pub fn new(files: Arc<dyn FileApi>, word: Arc<dyn WordExtractor>) -> Self {
        Self {
            files,
            word,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Prompt parts for `upload`, or none if its strategy fails.
    pub async fn attach(&self, upload: &MediaUpload) -> Attachment {
        let strategy = select_file_strategy(&upload.mime_type, upload.size());
        let Some(strategy) = strategy else {
            debug!(
                subsystem = "ingest",
                component = "file_strategy",
                mime_type = %upload.mime_type,
                "No strategy for media type, continuing text-only"
            );
            return Attachment::none(None);
        };

        let start = Instant::now();
        debug!(
            subsystem = "ingest",
            component = "file_strategy",
            strategy = strategy.as_str(),
            mime_type = %upload.mime_type,
            size_bytes = upload.size(),
            "Selected file strategy"
        );

        let result = match strategy {
            FileStrategy::RemoteUpload => self.remote_upload(upload).await,
            FileStrategy::TextExtraction(source) => self.extract_text(upload, source).await,
            FileStrategy::InlineEmbed => Ok(PromptPart::Inline {
                mime_type: upload.mime_type.clone(),
                data: upload.data.clone(),
            }),
        };

        match result {
            Ok(part) => {
                info!(
                    subsystem = "ingest",
                    component = "file_strategy",
                    strategy = strategy.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Media attached"
                );
                Attachment {
                    strategy: Some(strategy),
                    parts: vec![part],
                }
            }
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "file_strategy",
                    strategy = strategy.as_str(),
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "File strategy failed, continuing text-only"
                );
                Attachment::none(Some(strategy))
            }
        }
    }

    async fn remote_upload(&self, upload: &MediaUpload) -> Result<PromptPart, StrategyFailed> {
        const NAME: &str = "remote_upload";
        let file = self
            .files
            .upload(&upload.data, &upload.mime_type, &upload.filename)
            .await
            .map_err(StrategyFailed::from_error(NAME))?;

        // Video needs provider-side processing before it can be referenced.
        let file = if upload.kind() == MediaKind::Video {
            wait_until_active(self.files.as_ref(), file, self.poll)
                .await
                .map_err(StrategyFailed::from_error(NAME))?
        } else {
            file
        };

        Ok(PromptPart::File {
            mime_type: upload.mime_type.clone(),
            uri: file.uri,
        })
    }

    async fn extract_text(&self, upload: &MediaUpload, source: TextSource) -> Result<PromptPart, StrategyFailed> {
        const NAME: &str = "text_extraction";
        let text = match source {
            TextSource::Word => self
                .word
                .extract(&upload.data, &upload.filename, &upload.mime_type)
                .await
                .map_err(StrategyFailed::from_error(NAME))?,
            TextSource::Plain => decode_plain_text(&upload.data),
        };
        if text.trim().is_empty() {
            return Err(StrategyFailed::new(NAME, "document contains no text"));
        }
        Ok(PromptPart::Text(document_block(&upload.filename, &text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acervo_core::{Error, RemoteFileState, Result};
    use acervo_inference::mock::MockFileApi;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MB: u64 = 1024 * 1024;
    const WORD_MIME: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

    struct FakeWord {
        output: Result<String>,
        calls: AtomicUsize,
    }

    impl FakeWord {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                output: Err(Error::Internal("pandoc missing".into())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WordExtractor for FakeWord {
        async fn extract(&self, _: &[u8], _: &str, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.output {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(Error::Internal(e.to_string())),
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.output.is_ok())
        }
    }

    fn upload(name: &str, mime: &str, size: usize) -> MediaUpload {
        MediaUpload {
            filename: name.into(),
            mime_type: mime.into(),
            data: vec![b'a'; size],
        }
    }

    #[test]
    fn test_selection_table() {
        use FileStrategy::*;
        let word = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
        let cases = [
            ("audio/mpeg", 6 * MB, Some(RemoteUpload)),
            ("audio/mpeg", 5 * MB, Some(InlineEmbed)),
            ("audio/ogg", 1024, Some(InlineEmbed)),
            ("video/mp4", 10, Some(RemoteUpload)),
            ("application/pdf", 10, Some(RemoteUpload)),
            (word, 50 * MB, Some(TextExtraction(TextSource::Word))),
            ("application/msword", 10, Some(TextExtraction(TextSource::Word))),
            ("text/plain; charset=utf-8", 10, Some(TextExtraction(TextSource::Plain))),
            ("image/jpeg", 20 * MB, Some(InlineEmbed)),
            ("application/zip", 10, None),
        ];
        for (mime, size, expected) in cases {
            assert_eq!(select_file_strategy(mime, size), expected, "{} {}", mime, size);
        }
    }

    #[tokio::test]
    async fn test_inline_embed_for_image() {
        let attacher = MediaAttacher::new(Arc::new(MockFileApi::new()), FakeWord::ok(""));
        let out = attacher.attach(&upload("foto.png", "image/png", 3)).await;
        assert_eq!(out.strategy, Some(FileStrategy::InlineEmbed));
        assert!(matches!(&out.parts[0], PromptPart::Inline { mime_type, data } if mime_type == "image/png" && data.len() == 3));
    }

    #[tokio::test]
    async fn test_plain_text_is_delimited() {
        let attacher = MediaAttacher::new(Arc::new(MockFileApi::new()), FakeWord::ok(""));
        let mut file = upload("carta.txt", "text/plain", 0);
        file.data = "Querida Maria".as_bytes().to_vec();
        let out = attacher.attach(&file).await;
        match &out.parts[0] {
            PromptPart::Text(text) => {
                assert!(text.starts_with("=== DOCUMENT START: carta.txt ==="));
                assert!(text.contains("Querida Maria"));
            }
            other => panic!("unexpected part {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_word_extraction_failure_degrades() {
        let word = FakeWord::failing();
        let attacher = MediaAttacher::new(Arc::new(MockFileApi::new()), word.clone());
        let out = attacher
            .attach(&upload("ata.docx", WORD_MIME, 10))
            .await;
        assert_eq!(out.strategy, Some(FileStrategy::TextExtraction(TextSource::Word)));
        assert!(out.is_empty());
        assert_eq!(word.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_document_degrades() {
        let attacher = MediaAttacher::new(Arc::new(MockFileApi::new()), FakeWord::ok("  \n"));
        let out = attacher
            .attach(&upload("vazio.docx", WORD_MIME, 10))
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_pdf_uploaded_without_polling() {
        let files = MockFileApi::new();
        let attacher = MediaAttacher::new(Arc::new(files.clone()), FakeWord::ok(""));
        let out = attacher.attach(&upload("doc.pdf", "application/pdf", 100)).await;
        assert_eq!(out.strategy, Some(FileStrategy::RemoteUpload));
        assert!(matches!(&out.parts[0], PromptPart::File { uri, .. } if uri == "https://mock.files/doc.pdf"));
        assert_eq!(files.get_calls(), 0);
        assert_eq!(files.uploads(), vec![("application/pdf".to_string(), 100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_waits_until_active() {
        let files = MockFileApi::new().with_states(vec![
            RemoteFileState::Processing,
            RemoteFileState::Active,
        ]);
        let attacher = MediaAttacher::new(Arc::new(files.clone()), FakeWord::ok(""));
        let out = attacher.attach(&upload("festa.mp4", "video/mp4", 10)).await;
        assert_eq!(out.parts.len(), 1);
        assert_eq!(files.get_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_failed_state_degrades_without_retry() {
        let files = MockFileApi::new().with_states(vec![RemoteFileState::Failed]);
        let attacher = MediaAttacher::new(Arc::new(files.clone()), FakeWord::ok(""));
        let out = attacher.attach(&upload("festa.mp4", "video/mp4", 10)).await;
        assert_eq!(out.strategy, Some(FileStrategy::RemoteUpload));
        assert!(out.is_empty());
        assert_eq!(files.get_calls(), 1);
        assert_eq!(files.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_refused_degrades() {
        let files = MockFileApi::new().failing_uploads();
        let attacher = MediaAttacher::new(Arc::new(files), FakeWord::ok(""));
        let out = attacher.attach(&upload("longo.mp3", "audio/mpeg", 6 * MB as usize)).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_type_has_no_strategy() {
        let attacher = MediaAttacher::new(Arc::new(MockFileApi::new()), FakeWord::ok(""));
        let out = attacher.attach(&upload("a.zip", "application/zip", 10)).await;
        assert_eq!(out, Attachment::none(None));
    }
}
