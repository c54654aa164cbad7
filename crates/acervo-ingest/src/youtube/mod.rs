//! YouTube providers: metadata, transcripts and watch-page capture.

mod captions;
mod data_api;
mod oembed;
mod web;

pub use captions::{parse_timedtext, Transcript, TranscriptSegment};
pub use data_api::YouTubeDataApi;
pub use oembed::OEmbedClient;
pub use web::YouTubeWebClient;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use acervo_core::Result;

static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .expect("valid video id regex")
});

/// Extract the 11-character video id from any common YouTube URL form.
pub fn parse_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch URL for a video id.
pub fn watch_url(base: &str, video_id: &str) -> String {
    format!("{}/watch?v={}", base.trim_end_matches('/'), video_id)
}

/// Thumbnail URLs from best to worst resolution.
pub fn thumbnail_candidates(video_id: &str) -> Vec<String> {
    ["maxresdefault", "sddefault", "hqdefault"]
        .iter()
        .map(|size| format!("https://i.ytimg.com/vi/{}/{}.jpg", video_id, size))
        .collect()
}

/// Whatever is known about a video. Every field but the id may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub published_at: Option<String>,
    /// ISO 8601 duration, e.g. `PT12M3S`.
    pub duration: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl VideoMetadata {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            ..Default::default()
        }
    }

    /// Fill fields still missing here from `other`.
    pub fn merge_missing(&mut self, other: VideoMetadata) {
        fn fill(slot: &mut Option<String>, value: Option<String>) {
            if slot.as_deref().map_or(true, str::is_empty) {
                if let Some(v) = value.filter(|v| !v.is_empty()) {
                    *slot = Some(v);
                }
            }
        }
        fill(&mut self.title, other.title);
        fill(&mut self.description, other.description);
        fill(&mut self.channel, other.channel);
        fill(&mut self.published_at, other.published_at);
        fill(&mut self.duration, other.duration);
        fill(&mut self.thumbnail_url, other.thumbnail_url);
    }

    /// Title, description and thumbnail are all known.
    pub fn is_complete(&self) -> bool {
        self.title.is_some() && self.description.is_some() && self.thumbnail_url.is_some()
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled video")
    }
}

/// A page of the video site captured for fallback analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchPage {
    /// Transcript recovered from the page's own caption tracks.
    pub transcript: Option<Transcript>,
    /// Full description, often longer than the API snippet.
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Video metadata lookup.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<VideoMetadata>;

    fn name(&self) -> &str;
}

/// Direct transcript lookup. `Ok(None)` when the video has no captions.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn transcript(&self, video_id: &str) -> Result<Option<Transcript>>;
}

/// Watch-page capture.
#[async_trait]
pub trait WatchPageSource: Send + Sync {
    async fn capture(&self, video_id: &str) -> Result<WatchPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_id_forms() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(parse_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"), id);
        assert_eq!(parse_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("  https://m.youtube.com/watch?v=dQw4w9WgXcQ  "), id);
    }

    #[test]
    fn test_parse_video_id_rejects_other_urls() {
        assert_eq!(parse_video_id("https://vimeo.com/123456"), None);
        assert_eq!(parse_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(parse_video_id(""), None);
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut meta = VideoMetadata {
            title: Some("API title".into()),
            ..VideoMetadata::new("abc")
        };
        meta.merge_missing(VideoMetadata {
            title: Some("oEmbed title".into()),
            channel: Some("Canal".into()),
            thumbnail_url: Some(String::new()),
            ..VideoMetadata::new("abc")
        });
        assert_eq!(meta.title.as_deref(), Some("API title"));
        assert_eq!(meta.channel.as_deref(), Some("Canal"));
        assert_eq!(meta.thumbnail_url, None);
        assert!(!meta.is_complete());
    }

    #[test]
    fn test_thumbnail_candidates_best_first() {
        let urls = thumbnail_candidates("abc");
        assert!(urls[0].ends_with("/abc/maxresdefault.jpg"));
        assert!(urls.last().is_some_and(|u| u.ends_with("hqdefault.jpg")));
    }
}
