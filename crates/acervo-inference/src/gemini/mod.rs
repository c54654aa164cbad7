//! Gemini inference backend.
//!
//! One client implements three seams:
//!
//! - [`GenerationBackend`](acervo_core::GenerationBackend): text and multimodal
//!   `generateContent` calls
//! - [`ImageGenerator`](acervo_core::ImageGenerator): cover art through the
//!   image model
//! - [`FileApi`](acervo_core::FileApi): resumable upload and state lookup for
//!   large media
//!
//! # Example
//!
//! ```rust,no_run
//! use acervo_core::{GenerationBackend, Prompt};
//! use acervo_inference::gemini::GeminiBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = GeminiBackend::from_env().unwrap();
//!     let out = backend.generate(&Prompt::text("Hello").json()).await.unwrap();
//!     println!("{}", out.text);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{build_request, GeminiBackend, GeminiConfig};
pub use error::{to_acervo_error, GeminiErrorCode};
pub use types::*;
