//! Mock backends for deterministic testing.
//!
//! ```rust,ignore
//! use acervo_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .with_fixed_response(r#"{"title": "Festa"}"#)
//!     .with_response_when("TRANSCRIPT", r#"{"title": "From transcript"}"#);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use acervo_core::{
    Error, FileApi, GeneratedImage, Generation, GenerationBackend, ImageGenerator, Prompt,
    RemoteFile, RemoteFileState, Result, TokenUsage,
};

pub const MOCK_MODEL: &str = "mock-model";

#[derive(Debug, Clone)]
struct MockConfig {
    default_response: String,
    /// `(needle, response)`: first needle found in the prompt text wins.
    keyed_responses: Vec<(String, String)>,
    failure: Option<String>,
    usage: TokenUsage,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            default_response: "{}".to_string(),
            keyed_responses: Vec::new(),
            failure: None,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        }
    }
}

/// Generation backend that records every prompt it receives.
#[derive(Clone, Default)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<Prompt>>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `response` when the prompt text contains `needle`.
    pub fn with_response_when(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .keyed_responses
            .push((needle.into(), response.into()));
        self
    }

    /// Fail every call with an inference error.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    /// Every prompt received, in order.
    pub fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_call(&self) -> Option<Prompt> {
        self.calls().pop()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &Prompt) -> Result<Generation> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.clone());
        }
        if let Some(message) = &self.config.failure {
            return Err(Error::Inference(message.clone()));
        }
        let text = prompt.text_content();
        let response = self
            .config
            .keyed_responses
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.config.default_response.clone());
        Ok(Generation {
            text: response,
            model: MOCK_MODEL.to_string(),
            usage: self.config.usage,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.failure.is_none())
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

/// File API whose processing states are scripted.
///
/// Each `get` pops the next scripted state; once the script is exhausted
/// the last state repeats (`PROCESSING` when nothing was scripted).
#[derive(Clone)]
pub struct MockFileApi {
    states: Arc<Mutex<VecDeque<RemoteFileState>>>,
    last: Arc<Mutex<RemoteFileState>>,
    upload_state: RemoteFileState,
    fail_uploads: bool,
    uploads: Arc<Mutex<Vec<(String, usize)>>>,
    get_calls: Arc<Mutex<usize>>,
}

impl Default for MockFileApi {
    fn default() -> Self {
        Self {
            states: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(RemoteFileState::Processing)),
            upload_state: RemoteFileState::Processing,
            fail_uploads: false,
            uploads: Arc::new(Mutex::new(Vec::new())),
            get_calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl MockFileApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_states(self, states: Vec<RemoteFileState>) -> Self {
        if let Ok(mut queue) = self.states.lock() {
            queue.extend(states);
        }
        self
    }

    /// State reported by `upload` itself (images are usually `ACTIVE` at once).
    pub fn with_upload_state(mut self, state: RemoteFileState) -> Self {
        self.upload_state = state;
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.lock().map(|n| *n).unwrap_or_default()
    }

    /// `(mime_type, byte_len)` of each upload.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FileApi for MockFileApi {
    async fn upload(&self, data: &[u8], mime_type: &str, display_name: &str) -> Result<RemoteFile> {
        if self.fail_uploads {
            return Err(Error::Request("mock upload refused".to_string()));
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((mime_type.to_string(), data.len()));
        }
        Ok(RemoteFile {
            name: format!("files/{}", display_name),
            uri: format!("https://mock.files/{}", display_name),
            mime_type: mime_type.to_string(),
            state: self.upload_state,
        })
    }

    async fn get(&self, name: &str) -> Result<RemoteFile> {
        if let Ok(mut n) = self.get_calls.lock() {
            *n += 1;
        }
        let next = self.states.lock().ok().and_then(|mut q| q.pop_front());
        let state = match (next, self.last.lock()) {
            (Some(state), Ok(mut last)) => {
                *last = state;
                state
            }
            (Some(state), Err(_)) => state,
            (None, Ok(last)) => *last,
            (None, Err(_)) => RemoteFileState::Processing,
        };
        Ok(RemoteFile {
            name: name.to_string(),
            uri: format!("https://mock.files/{}", name),
            mime_type: "application/octet-stream".to_string(),
            state,
        })
    }
}

/// Image generator returning a fixed PNG header, or failing.
#[derive(Clone, Default)]
pub struct MockImageGenerator {
    fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(prompt.to_string());
        }
        if self.fail {
            return Err(Error::Inference("mock image generation failed".to_string()));
        }
        Ok(GeneratedImage {
            mime_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyed_response_wins() {
        let backend = MockGenerationBackend::new()
            .with_fixed_response("default")
            .with_response_when("TRANSCRIPT", "keyed");
        let out = backend.generate(&Prompt::text("has TRANSCRIPT inside")).await.unwrap();
        assert_eq!(out.text, "keyed");
        let out = backend.generate(&Prompt::text("plain")).await.unwrap();
        assert_eq!(out.text, "default");
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let backend = MockGenerationBackend::new().with_failure("boom");
        assert!(backend.generate(&Prompt::text("x")).await.is_err());
        assert_eq!(backend.calls().len(), 1);
        assert!(!backend.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_file_api_repeats_last_state() {
        let api = MockFileApi::new().with_states(vec![RemoteFileState::Active]);
        assert_eq!(api.get("files/x").await.unwrap().state, RemoteFileState::Active);
        assert_eq!(api.get("files/x").await.unwrap().state, RemoteFileState::Active);
        assert_eq!(api.get_calls(), 2);
    }
}
