//! Public oEmbed metadata lookup. No key needed, but only title, author
//! and thumbnail come back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use acervo_core::defaults;
use acervo_core::{Error, Result};

use super::{watch_url, MetadataProvider, VideoMetadata};

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    author_name: Option<String>,
    thumbnail_url: Option<String>,
}

pub struct OEmbedClient {
    client: Client,
    base_url: String,
}

impl OEmbedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for OEmbedClient {
    async fn fetch(&self, video_id: &str) -> Result<VideoMetadata> {
        let response = self
            .client
            .get(format!("{}/oembed", self.base_url))
            .query(&[
                ("url", watch_url(defaults::YOUTUBE_WEB_BASE, video_id).as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!("oEmbed returned {}", status)));
        }

        let body: OEmbedResponse = response.json().await?;
        Ok(VideoMetadata {
            title: body.title,
            channel: body.author_name,
            thumbnail_url: body.thumbnail_url,
            ..VideoMetadata::new(video_id)
        })
    }

    fn name(&self) -> &str {
        "oembed"
    }
}
