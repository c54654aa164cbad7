//! Link ingestion: metadata gathering plus an ordered strategy chain.
//!
//! The chain is tried in order until one strategy produces a prompt:
//!
//! 1. [`TranscriptStrategy`]: direct transcript lookup.
//! 2. [`VisualNavigationStrategy`]: watch-page capture. A caption track
//!    found on the page is used as a transcript; otherwise the thumbnail is
//!    uploaded and analysed visually.
//! 3. [`PureMetadataStrategy`]: title, description and contributor note.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use acervo_core::defaults;
use acervo_core::{
    AnalysisType, Error, FileApi, Generation, GenerationBackend, OrganizationConfig, Prompt,
    PromptPart, Result, StructuredMemory,
};
use acervo_inference::{wait_until_active, PollPolicy};

use crate::error::StrategyFailed;
use crate::fetch::{HttpMediaFetcher, MediaFetcher};
use crate::postprocess::{parse_structured_memory, LinkMetadata};
use crate::prompt::PromptBuilder;
use crate::youtube::{
    parse_video_id, thumbnail_candidates, MetadataProvider, OEmbedClient, Transcript,
    TranscriptSource, VideoMetadata, WatchPageSource, YouTubeDataApi, YouTubeWebClient,
};

/// Everything a strategy may use.
#[derive(Debug, Clone)]
pub struct LinkContext {
    pub url: String,
    pub metadata: VideoMetadata,
    pub note: Option<String>,
}

/// A prompt ready for the model, with its provenance.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub strategy: &'static str,
    pub analysis_type: AnalysisType,
    pub prompt: Prompt,
    /// Transcript text the prompt was built from.
    pub transcription: Option<String>,
}

#[async_trait]
pub trait LinkStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn prepare(
        &self,
        ctx: &LinkContext,
        prompts: &PromptBuilder,
    ) -> std::result::Result<PreparedPrompt, StrategyFailed>;
}

fn transcript_prompt(
    strategy: &'static str,
    ctx: &LinkContext,
    prompts: &PromptBuilder,
    transcript: &Transcript,
    metadata: &VideoMetadata,
) -> PreparedPrompt {
    let text = transcript.to_timestamped_text(defaults::TRANSCRIPT_MAX_CHARS);
    PreparedPrompt {
        strategy,
        analysis_type: AnalysisType::Transcript,
        prompt: prompts.transcript_prompt(metadata, &text, ctx.note.as_deref()),
        transcription: Some(transcript.plain_text()),
    }
}

/// Strategy A.
pub struct TranscriptStrategy {
    source: Arc<dyn TranscriptSource>,
}

impl TranscriptStrategy {
    pub const NAME: &'static str = "transcript";

    pub fn new(source: Arc<dyn TranscriptSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl LinkStrategy for TranscriptStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn prepare(
        &self,
        ctx: &LinkContext,
        prompts: &PromptBuilder,
    ) -> std::result::Result<PreparedPrompt, StrategyFailed> {
        let transcript = self
            .source
            .transcript(&ctx.metadata.video_id)
            .await
            .map_err(StrategyFailed::from_error(Self::NAME))?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StrategyFailed::new(Self::NAME, "no transcript available"))?;
        Ok(transcript_prompt(Self::NAME, ctx, prompts, &transcript, &ctx.metadata))
    }
}

/// Strategy C.
pub struct VisualNavigationStrategy {
    page: Arc<dyn WatchPageSource>,
    fetcher: Arc<dyn MediaFetcher>,
    files: Arc<dyn FileApi>,
    poll: PollPolicy,
}

impl VisualNavigationStrategy {
    pub const NAME: &'static str = "visual_navigation";

    pub fn new(
        page: Arc<dyn WatchPageSource>,
        fetcher: Arc<dyn MediaFetcher>,
        files: Arc<dyn FileApi>,
    ) -> Self {
        Self {
            page,
            fetcher,
            files,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    async fn upload_thumbnail(&self, url: &str, video_id: &str) -> Result<PromptPart> {
        let media = self.fetcher.fetch(url).await?;
        let file = self
            .files
            .upload(&media.data, &media.mime_type, &format!("{}-thumbnail", video_id))
            .await?;
        let file = wait_until_active(self.files.as_ref(), file, self.poll).await?;
        Ok(PromptPart::File {
            mime_type: media.mime_type,
            uri: file.uri,
        })
    }
}

#[async_trait]
impl LinkStrategy for VisualNavigationStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn prepare(
        &self,
        ctx: &LinkContext,
        prompts: &PromptBuilder,
    ) -> std::result::Result<PreparedPrompt, StrategyFailed> {
        let video_id = ctx.metadata.video_id.as_str();
        let page = self
            .page
            .capture(video_id)
            .await
            .map_err(StrategyFailed::from_error(Self::NAME))?;

        // The page description is usually the full text; the API snippet may be cut.
        let mut metadata = ctx.metadata.clone();
        if let Some(full) = page.description.clone() {
            let current = metadata.description.as_deref().map_or(0, str::len);
            if full.len() > current {
                metadata.description = Some(full);
            }
        }

        if let Some(transcript) = page.transcript.as_ref().filter(|t| !t.is_empty()) {
            debug!(
                subsystem = "ingest",
                component = "link_chain",
                strategy = Self::NAME,
                video_id,
                "Recovered transcript from watch page captions"
            );
            return Ok(transcript_prompt(Self::NAME, ctx, prompts, transcript, &metadata));
        }

        let thumbnail = metadata
            .thumbnail_url
            .clone()
            .or(page.thumbnail_url.clone())
            .ok_or_else(|| StrategyFailed::new(Self::NAME, "no thumbnail available"))?;

        let image = self
            .upload_thumbnail(&thumbnail, video_id)
            .await
            .map_err(StrategyFailed::from_error(Self::NAME))?;

        Ok(PreparedPrompt {
            strategy: Self::NAME,
            analysis_type: AnalysisType::MultimodalVisual,
            prompt: prompts.visual_prompt(&metadata, ctx.note.as_deref(), image),
            transcription: None,
        })
    }
}

/// Strategy D. Never fails.
pub struct PureMetadataStrategy;

impl PureMetadataStrategy {
    pub const NAME: &'static str = "pure_metadata";
}

#[async_trait]
impl LinkStrategy for PureMetadataStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn prepare(
        &self,
        ctx: &LinkContext,
        prompts: &PromptBuilder,
    ) -> std::result::Result<PreparedPrompt, StrategyFailed> {
        Ok(PreparedPrompt {
            strategy: Self::NAME,
            analysis_type: AnalysisType::MetadataOnly,
            prompt: prompts.metadata_prompt(&ctx.metadata, ctx.note.as_deref()),
            transcription: None,
        })
    }
}

/// Structured result of a processed link.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOutcome {
    #[serde(flatten)]
    pub memory: StructuredMemory,
    pub thumbnail_url: Option<String>,
    pub metadata: LinkMetadata,
    #[serde(skip)]
    pub generation: Generation,
}

pub struct LinkIngestor {
    metadata: Vec<Arc<dyn MetadataProvider>>,
    chain: Vec<Arc<dyn LinkStrategy>>,
    backend: Arc<dyn GenerationBackend>,
}

impl LinkIngestor {
    pub fn new(
        metadata: Vec<Arc<dyn MetadataProvider>>,
        chain: Vec<Arc<dyn LinkStrategy>>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            metadata,
            chain,
            backend,
        }
    }

    /// Production wiring: Data API (when keyed) then oEmbed for metadata,
    /// the public site for transcripts and pages.
    pub fn from_env(backend: Arc<dyn GenerationBackend>, files: Arc<dyn FileApi>) -> Result<Self> {
        let mut metadata: Vec<Arc<dyn MetadataProvider>> = Vec::new();
        if let Some(api) = YouTubeDataApi::from_env()? {
            metadata.push(Arc::new(api));
        }
        metadata.push(Arc::new(OEmbedClient::new(defaults::YOUTUBE_WEB_BASE)?));

        let web = Arc::new(YouTubeWebClient::new(defaults::YOUTUBE_WEB_BASE)?);
        let chain: Vec<Arc<dyn LinkStrategy>> = vec![
            Arc::new(TranscriptStrategy::new(web.clone())),
            Arc::new(VisualNavigationStrategy::new(
                web,
                Arc::new(HttpMediaFetcher::new()),
                files,
            )),
            Arc::new(PureMetadataStrategy),
        ];
        Ok(Self::new(metadata, chain, backend))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|s| s.name()).collect()
    }

    /// Query providers in order, filling gaps. Stops once complete.
    pub async fn gather_metadata(&self, video_id: &str) -> VideoMetadata {
        let mut metadata = VideoMetadata::new(video_id);
        for provider in &self.metadata {
            if metadata.is_complete() {
                break;
            }
            match provider.fetch(video_id).await {
                Ok(found) => metadata.merge_missing(found),
                Err(e) => warn!(
                    subsystem = "ingest",
                    component = "link_metadata",
                    provider = provider.name(),
                    video_id,
                    error = %e,
                    "Metadata provider failed"
                ),
            }
        }
        metadata
    }

    /// Run the chain; the first strategy to produce a prompt wins.
    pub async fn select(&self, ctx: &LinkContext, prompts: &PromptBuilder) -> Result<PreparedPrompt> {
        for strategy in &self.chain {
            let start = Instant::now();
            match strategy.prepare(ctx, prompts).await {
                Ok(prepared) => {
                    info!(
                        subsystem = "ingest",
                        component = "link_chain",
                        strategy = strategy.name(),
                        analysis_type = prepared.analysis_type.as_str(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Link strategy selected"
                    );
                    return Ok(prepared);
                }
                Err(e) => warn!(
                    subsystem = "ingest",
                    component = "link_chain",
                    strategy = strategy.name(),
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Link strategy failed, trying next"
                ),
            }
        }
        Err(Error::Inference(
            "Every link analysis strategy failed".to_string(),
        ))
    }

    /// Turn a video link into a structured memory.
    pub async fn process(
        &self,
        url: &str,
        note: Option<&str>,
        config: &OrganizationConfig,
    ) -> Result<LinkOutcome> {
        let video_id = parse_video_id(url)
            .ok_or_else(|| Error::InvalidInput(format!("Not a YouTube video URL: {}", url)))?;

        let metadata = self.gather_metadata(&video_id).await;
        let ctx = LinkContext {
            url: url.trim().to_string(),
            metadata,
            note: note.map(str::to_string).filter(|n| !n.trim().is_empty()),
        };
        let prompts = PromptBuilder::new(config.clone());
        let prepared = self.select(&ctx, &prompts).await?;

        let generation = self.backend.generate(&prepared.prompt).await?;
        let mut memory = parse_structured_memory(&generation.text)?;
        if memory.transcription.is_none() {
            memory.transcription = prepared.transcription;
        }

        let thumbnail_url = ctx
            .metadata
            .thumbnail_url
            .clone()
            .or_else(|| thumbnail_candidates(&video_id).into_iter().next());
        let metadata = LinkMetadata::youtube(
            &ctx.url,
            ctx.metadata.title_or_default(),
            prepared.analysis_type,
        );

        Ok(LinkOutcome {
            memory,
            thumbnail_url,
            metadata,
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedMedia;
    use crate::prompt::{METADATA_ONLY_MARKER, TRANSCRIPT_MARKER, VISUAL_MARKER};
    use crate::youtube::{TranscriptSegment, WatchPage};
    use acervo_core::RemoteFileState;
    use acervo_inference::mock::{MockFileApi, MockGenerationBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transcript(text: &str) -> Transcript {
        Transcript {
            language: Some("pt".into()),
            segments: vec![TranscriptSegment {
                start_secs: 3.0,
                text: text.into(),
            }],
        }
    }

    struct FakeTranscripts(Result<Option<Transcript>>);

    #[async_trait]
    impl TranscriptSource for FakeTranscripts {
        async fn transcript(&self, _: &str) -> Result<Option<Transcript>> {
            match &self.0 {
                Ok(t) => Ok(t.clone()),
                Err(e) => Err(Error::Request(e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakePage {
        page: Option<WatchPage>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WatchPageSource for FakePage {
        async fn capture(&self, _: &str) -> Result<WatchPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page
                .clone()
                .ok_or_else(|| Error::Request("watch page blocked".into()))
        }
    }

    struct FakeFetcher(bool);

    #[async_trait]
    impl MediaFetcher for FakeFetcher {
        async fn fetch(&self, _: &str) -> Result<FetchedMedia> {
            if self.0 {
                Ok(FetchedMedia {
                    data: vec![0xFF, 0xD8],
                    mime_type: "image/jpeg".into(),
                })
            } else {
                Err(Error::Timeout("thumbnail download".into()))
            }
        }
    }

    fn ctx() -> LinkContext {
        LinkContext {
            url: "https://youtu.be/abcdefghijk".into(),
            metadata: VideoMetadata {
                title: Some("Folia de Reis".into()),
                description: Some("curta".into()),
                thumbnail_url: Some("https://i.ytimg.com/vi/abcdefghijk/hqdefault.jpg".into()),
                ..VideoMetadata::new("abcdefghijk")
            },
            note: Some("minha cidade".into()),
        }
    }

    fn prompts() -> PromptBuilder {
        PromptBuilder::new(OrganizationConfig::default())
    }

    fn visual(page: FakePage, fetch_ok: bool, files: MockFileApi) -> VisualNavigationStrategy {
        VisualNavigationStrategy::new(Arc::new(page), Arc::new(FakeFetcher(fetch_ok)), Arc::new(files))
    }

    fn ingestor(chain: Vec<Arc<dyn LinkStrategy>>) -> LinkIngestor {
        LinkIngestor::new(Vec::new(), chain, Arc::new(MockGenerationBackend::new()))
    }

    #[tokio::test]
    async fn test_transcript_strategy_requests_chapters() {
        let strategy = TranscriptStrategy::new(Arc::new(FakeTranscripts(Ok(Some(transcript("boa noite"))))));
        let prepared = strategy.prepare(&ctx(), &prompts()).await.unwrap();
        assert_eq!(prepared.analysis_type, AnalysisType::Transcript);
        let text = prepared.prompt.text_content();
        assert!(text.contains(TRANSCRIPT_MARKER));
        assert!(text.contains("[00:03] boa noite"));
        assert!(text.contains("chapters"));
        assert_eq!(prepared.transcription.as_deref(), Some("boa noite"));
    }

    #[tokio::test]
    async fn test_empty_transcript_fails_strategy() {
        let strategy = TranscriptStrategy::new(Arc::new(FakeTranscripts(Ok(Some(transcript("  "))))));
        let err = strategy.prepare(&ctx(), &prompts()).await.unwrap_err();
        assert_eq!(err.strategy, TranscriptStrategy::NAME);
    }

    #[tokio::test]
    async fn test_page_captions_land_on_transcript_prompt() {
        let files = MockFileApi::new();
        let page = FakePage {
            page: Some(WatchPage {
                transcript: Some(transcript("legenda recuperada")),
                description: Some("descrição completa do vídeo".into()),
                thumbnail_url: None,
            }),
            ..Default::default()
        };
        let prepared = visual(page, true, files.clone())
            .prepare(&ctx(), &prompts())
            .await
            .unwrap();
        assert_eq!(prepared.analysis_type, AnalysisType::Transcript);
        let text = prepared.prompt.text_content();
        assert!(text.contains(TRANSCRIPT_MARKER));
        assert!(text.contains("legenda recuperada"));
        assert!(text.contains("descrição completa do vídeo"));
        assert!(!text.contains(VISUAL_MARKER));
        assert!(!prepared.prompt.has_media());
        assert!(files.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_visual_prompt_uploads_thumbnail() {
        let files = MockFileApi::new().with_upload_state(RemoteFileState::Active);
        let page = FakePage {
            page: Some(WatchPage::default()),
            ..Default::default()
        };
        let prepared = visual(page, true, files.clone())
            .prepare(&ctx(), &prompts())
            .await
            .unwrap();
        assert_eq!(prepared.analysis_type, AnalysisType::MultimodalVisual);
        assert!(prepared.prompt.text_content().contains(VISUAL_MARKER));
        assert!(matches!(
            prepared.prompt.parts.last(),
            Some(PromptPart::File { mime_type, .. }) if mime_type == "image/jpeg"
        ));
        assert_eq!(files.uploads(), vec![("image/jpeg".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_thumbnail_timeout_fails_strategy() {
        let page = FakePage {
            page: Some(WatchPage::default()),
            ..Default::default()
        };
        let err = visual(page, false, MockFileApi::new())
            .prepare(&ctx(), &prompts())
            .await
            .unwrap_err();
        assert_eq!(err.strategy, VisualNavigationStrategy::NAME);
        assert!(err.reason.contains("thumbnail"));
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let page = Arc::new(FakePage::default());
        let chain: Vec<Arc<dyn LinkStrategy>> = vec![
            Arc::new(TranscriptStrategy::new(Arc::new(FakeTranscripts(Ok(Some(transcript("oi"))))))),
            Arc::new(VisualNavigationStrategy::new(
                page.clone(),
                Arc::new(FakeFetcher(true)),
                Arc::new(MockFileApi::new()),
            )),
            Arc::new(PureMetadataStrategy),
        ];
        let prepared = ingestor(chain).select(&ctx(), &prompts()).await.unwrap();
        assert_eq!(prepared.strategy, TranscriptStrategy::NAME);
        assert_eq!(page.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failures_land_on_pure_metadata() {
        let chain: Vec<Arc<dyn LinkStrategy>> = vec![
            Arc::new(TranscriptStrategy::new(Arc::new(FakeTranscripts(Err(Error::Request("blocked".into())))))),
            Arc::new(visual(FakePage::default(), false, MockFileApi::new())),
            Arc::new(PureMetadataStrategy),
        ];
        let prepared = ingestor(chain).select(&ctx(), &prompts()).await.unwrap();
        assert_eq!(prepared.analysis_type, AnalysisType::MetadataOnly);
        let text = prepared.prompt.text_content();
        assert!(text.contains(METADATA_ONLY_MARKER));
        assert!(text.contains("Folia de Reis"));
        assert!(text.contains("minha cidade"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_thumbnail_processing_lands_on_pure_metadata() {
        let files = MockFileApi::new().with_states(vec![RemoteFileState::Failed]);
        let page = FakePage {
            page: Some(WatchPage::default()),
            ..Default::default()
        };
        let chain: Vec<Arc<dyn LinkStrategy>> = vec![
            Arc::new(TranscriptStrategy::new(Arc::new(FakeTranscripts(Ok(None))))),
            Arc::new(visual(page, true, files.clone())),
            Arc::new(PureMetadataStrategy),
        ];
        let prepared = ingestor(chain).select(&ctx(), &prompts()).await.unwrap();
        assert_eq!(prepared.analysis_type, AnalysisType::MetadataOnly);
        assert_eq!(files.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_an_error() {
        let err = ingestor(Vec::new()).select(&ctx(), &prompts()).await.unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[tokio::test]
    async fn test_process_rejects_non_youtube_url() {
        let err = ingestor(vec![Arc::new(PureMetadataStrategy)])
            .process("https://example.com/video", None, &OrganizationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
