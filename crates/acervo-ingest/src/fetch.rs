//! Remote media download with a hard deadline.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use acervo_core::defaults::DOWNLOAD_TIMEOUT_SECS;
use acervo_core::{detect_mime_type, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Downloads remote media (thumbnails, audio, video).
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia>;
}

pub struct HttpMediaFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpMediaFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl Default for HttpMediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    /// The deadline covers connect, headers and body; a partial body is
    /// discarded.
    async fn fetch(&self, url: &str) -> Result<FetchedMedia> {
        let start = Instant::now();
        let download = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::Request(format!("Download of {} returned {}", url, status)));
            }
            let claimed = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let data = response.bytes().await?.to_vec();
            Ok::<_, Error>((claimed, data))
        };

        let (claimed, data) = tokio::time::timeout(self.timeout, download)
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Download of {} exceeded {}s",
                    url,
                    self.timeout.as_secs()
                ))
            })??;

        let filename = url.split('?').next().unwrap_or(url);
        let mime_type = detect_mime_type(filename, &data, &claimed);
        debug!(
            subsystem = "ingest",
            component = "fetch",
            bytes = data.len(),
            mime_type = %mime_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "Downloaded media"
        );
        Ok(FetchedMedia { data, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body_and_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vi/abc/maxresdefault.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
            )
            .mount(&server)
            .await;

        let media = HttpMediaFetcher::new()
            .fetch(&format!("{}/vi/abc/maxresdefault.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(media.mime_type, "image/jpeg");
        assert_eq!(media.data.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = HttpMediaFetcher::with_timeout(Duration::from_millis(100))
            .fetch(&format!("{}/slow.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = HttpMediaFetcher::new()
            .fetch(&format!("{}/missing.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }
}
