//! Object storage for user media.
//!
//! Cloudinary (signed upload) when credentials are configured, otherwise a
//! local directory served under `MEDIA_PUBLIC_URL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use acervo_core::defaults;
use acervo_core::{new_v7, Error, MediaStore, Result};

/// Keep `[A-Za-z0-9._-]`, replace anything else with `_`.
fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn sanitize_folder(folder: &str) -> String {
    folder
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(sanitize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn stem(filename: &str) -> &str {
    filename.rsplit_once('.').map_or(filename, |(stem, _)| stem)
}

// =============================================================================
// CLOUDINARY
// =============================================================================

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorResponse {
    error: CloudinaryError,
}

#[derive(Debug, Deserialize)]
struct CloudinaryError {
    message: String,
}

pub struct CloudinaryStore {
    client: Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStore {
    pub fn new(
        base_url: impl Into<String>,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::GEN_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        })
    }

    /// SHA-256 signature over the alphabetically sorted parameters.
    pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
        let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn store(&self, data: &[u8], mime_type: &str, folder: &str, filename: &str) -> Result<String> {
        let start = Instant::now();
        let folder = sanitize_folder(folder);
        let public_id = format!("{}-{}", sanitize_segment(stem(filename)), new_v7().simple());
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = Self::sign(
            &[
                ("folder", folder.as_str()),
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.api_secret,
        );

        let file = Part::bytes(data.to_vec())
            .file_name(sanitize_segment(filename))
            .mime_str(mime_type)
            .map_err(|e| Error::InvalidInput(format!("Invalid MIME type {}: {}", mime_type, e)))?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.clone())
            .text("public_id", public_id)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(format!("{}/{}/auto/upload", self.base_url, self.cloud_name))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<CloudinaryErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::Request(format!(
                "Cloudinary upload failed ({}): {}",
                status, message
            )));
        }

        let uploaded: CloudinaryUploadResponse = serde_json::from_str(&body)?;
        let url = uploaded
            .secure_url
            .or(uploaded.url)
            .ok_or_else(|| Error::Request("Cloudinary response has no URL".to_string()))?;

        info!(
            subsystem = "storage",
            component = "cloudinary",
            folder = %folder,
            bytes = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Media uploaded"
        );
        Ok(url)
    }

    fn name(&self) -> &str {
        "cloudinary"
    }
}

// =============================================================================
// LOCAL FILESYSTEM
// =============================================================================

pub struct LocalMediaStore {
    root: PathBuf,
    public_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, data: &[u8], _mime_type: &str, folder: &str, filename: &str) -> Result<String> {
        let folder = sanitize_folder(folder);
        let name = format!("{}-{}", new_v7().simple(), sanitize_segment(filename));
        let dir = self.root.join(&folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), data).await?;

        debug!(
            subsystem = "storage",
            component = "local",
            folder = %folder,
            file = %name,
            bytes = data.len(),
            "Media stored"
        );
        if folder.is_empty() {
            Ok(format!("{}/{}", self.public_url, name))
        } else {
            Ok(format!("{}/{}/{}", self.public_url, folder, name))
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Cloudinary when all three credentials are set, local storage otherwise.
pub fn media_store_from_env() -> Result<Arc<dyn MediaStore>> {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    match (
        var(defaults::ENV_CLOUDINARY_CLOUD_NAME),
        var(defaults::ENV_CLOUDINARY_API_KEY),
        var(defaults::ENV_CLOUDINARY_API_SECRET),
    ) {
        (Some(cloud), Some(key), Some(secret)) => Ok(Arc::new(CloudinaryStore::new(
            defaults::CLOUDINARY_API_BASE,
            cloud,
            key,
            secret,
        )?)),
        _ => {
            let root = var(defaults::ENV_MEDIA_STORAGE_PATH)
                .unwrap_or_else(|| defaults::MEDIA_STORAGE_PATH.to_string());
            let public_url = var(defaults::ENV_MEDIA_PUBLIC_URL)
                .unwrap_or_else(|| defaults::MEDIA_PUBLIC_URL.to_string());
            Ok(Arc::new(LocalMediaStore::new(root, public_url)))
        }
    }
}
