//! YouTube Data API v3 metadata provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use acervo_core::defaults;
use acervo_core::{Error, Result};

use super::{MetadataProvider, VideoMetadata};

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.maxres
            .or(self.standard)
            .or(self.high)
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Authenticated metadata lookup. Needs `YOUTUBE_API_KEY`.
pub struct YouTubeDataApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeDataApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// `None` when no API key is configured.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(defaults::ENV_YOUTUBE_API_KEY) {
            Ok(key) if !key.trim().is_empty() => {
                Ok(Some(Self::new(defaults::YOUTUBE_API_BASE, key.trim())?))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl MetadataProvider for YouTubeDataApi {
    async fn fetch(&self, video_id: &str) -> Result<VideoMetadata> {
        let response = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "YouTube Data API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let list: VideoListResponse = response.json().await?;
        let item = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("Video {} not found", video_id)))?;

        let mut meta = VideoMetadata::new(video_id);
        if let Some(snippet) = item.snippet {
            meta.title = snippet.title;
            meta.description = snippet.description;
            meta.channel = snippet.channel_title;
            meta.published_at = snippet.published_at;
            meta.thumbnail_url = snippet.thumbnails.best();
        }
        meta.duration = item.content_details.and_then(|d| d.duration);

        debug!(
            subsystem = "ingest",
            component = "youtube_data_api",
            video_id,
            has_title = meta.title.is_some(),
            "Fetched video metadata"
        );
        Ok(meta)
    }

    fn name(&self) -> &str {
        "youtube_data_api"
    }
}
