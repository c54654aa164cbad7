//! # acervo-inference
//!
//! Generative-AI backends for acervo.
//!
//! This crate provides:
//! - Gemini implementation of generation, image generation and file upload
//! - Readiness polling for uploaded media
//! - Mock backends (feature `mock`) for tests in downstream crates

pub mod gemini;
pub mod poll;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use acervo_core::*;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use poll::{wait_until_active, PollPolicy};
