//! Gemini REST backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, info, warn};

use acervo_core::defaults;
use acervo_core::{
    Error, FileApi, GeneratedImage, Generation, GenerationBackend, ImageGenerator, Prompt,
    PromptPart, RemoteFile, RemoteFileState, Result, TokenUsage,
};

use super::error::error_from_body;
use super::types::*;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    /// Model for text and multimodal generation.
    pub model: String,
    /// Model for cover image generation.
    pub image_model: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GEMINI_BASE_URL.to_string(),
            api_key: String::new(),
            model: defaults::GEMINI_MODEL.to_string(),
            image_model: defaults::GEMINI_IMAGE_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    /// Read `GEMINI_*` variables. The API key is required.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(defaults::ENV_GEMINI_API_KEY)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", defaults::ENV_GEMINI_API_KEY)))?;
        Ok(Self {
            base_url: std::env::var(defaults::ENV_GEMINI_BASE_URL)
                .unwrap_or_else(|_| defaults::GEMINI_BASE_URL.to_string()),
            api_key,
            model: std::env::var(defaults::ENV_GEMINI_MODEL)
                .unwrap_or_else(|_| defaults::GEMINI_MODEL.to_string()),
            image_model: std::env::var(defaults::ENV_GEMINI_IMAGE_MODEL)
                .unwrap_or_else(|_| defaults::GEMINI_IMAGE_MODEL.to_string()),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        })
    }
}

/// Client for generation, image generation and the file API.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "gemini",
            base_url = %config.base_url,
            model = %config.model,
            image_model = %config.image_model,
            "Initializing Gemini backend"
        );
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
    }

    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let url = self.url(&format!("v1beta/models/{}:generateContent", model));
        let response = self.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse Gemini response: {}", e)))?;

        if parsed.candidates.is_empty() {
            let reason = parsed
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(Error::Inference(format!("Gemini returned no output: {}", reason)));
        }
        Ok(parsed)
    }
}

/// Map a prompt onto the wire request.
pub fn build_request(prompt: &Prompt) -> GenerateContentRequest {
    let parts = prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => Part::text(text.clone()),
            PromptPart::Inline { mime_type, data } => Part {
                inline_data: Some(Blob {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
                ..Default::default()
            },
            PromptPart::File { mime_type, uri } => Part {
                file_data: Some(FileData {
                    mime_type: mime_type.clone(),
                    file_uri: uri.clone(),
                }),
                ..Default::default()
            },
        })
        .collect();

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        system_instruction: prompt.system.as_ref().map(|s| Content {
            role: None,
            parts: vec![Part::text(s.clone())],
        }),
        generation_config: prompt.json_output.then(|| GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        }),
    }
}

fn remote_file(resource: FileResource) -> RemoteFile {
    RemoteFile {
        state: RemoteFileState::parse(&resource.state),
        name: resource.name,
        uri: resource.uri,
        mime_type: resource.mime_type,
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, prompt: &Prompt) -> Result<Generation> {
        let start = Instant::now();
        let request = build_request(prompt);
        let response = self.generate_content(&self.config.model, &request).await?;

        let usage = response
            .usage_metadata
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();
        let text = response.text();

        debug!(
            subsystem = "inference",
            component = "gemini",
            op = "generate",
            model = %self.config.model,
            parts = prompt.parts.len(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            response_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );

        Ok(Generation {
            text,
            model: self.config.model.clone(),
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let url = self.url(&format!("v1beta/models/{}", self.config.model));
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(subsystem = "inference", component = "gemini", status = %resp.status(), "Gemini health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(subsystem = "inference", component = "gemini", error = %e, "Gemini health check failed");
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ImageGenerator for GeminiBackend {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                ..Default::default()
            }),
        };
        let response = self
            .generate_content(&self.config.image_model, &request)
            .await?;

        let blob = response
            .first_inline_data()
            .ok_or_else(|| Error::Inference("Image model returned no image".to_string()))?;
        let data = BASE64
            .decode(blob.data.as_bytes())
            .map_err(|e| Error::Inference(format!("Invalid image payload: {}", e)))?;

        debug!(
            subsystem = "inference",
            component = "gemini",
            op = "generate_image",
            mime_type = %blob.mime_type,
            bytes = data.len(),
            "Image generated"
        );
        Ok(GeneratedImage {
            mime_type: blob.mime_type.clone(),
            data,
        })
    }
}

#[async_trait]
impl FileApi for GeminiBackend {
    /// Resumable upload: a start call returns a session URL, then the bytes
    /// are sent and the upload finalized in one request.
    async fn upload(&self, data: &[u8], mime_type: &str, display_name: &str) -> Result<RemoteFile> {
        let start = Instant::now();
        let start_url = self.url("upload/v1beta/files");
        let response = self
            .post(&start_url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: StartUploadFile {
                    display_name: display_name.to_string(),
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }
        let session_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::FileProcessing("Upload session URL missing".to_string()))?;

        let response = self
            .client
            .post(&session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("Content-Length", data.len().to_string())
            .body(data.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }
        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| Error::FileProcessing(format!("Failed to parse upload response: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "gemini_files",
            op = "upload",
            file = %uploaded.file.name,
            mime_type,
            bytes = data.len(),
            state = %uploaded.file.state,
            duration_ms = start.elapsed().as_millis() as u64,
            "File uploaded"
        );
        Ok(remote_file(uploaded.file))
    }

    async fn get(&self, name: &str) -> Result<RemoteFile> {
        let url = self.url(&format!("v1beta/{}", name));
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }
        let resource: FileResource = response
            .json()
            .await
            .map_err(|e| Error::FileProcessing(format!("Failed to parse file state: {}", e)))?;
        Ok(remote_file(resource))
    }
}
