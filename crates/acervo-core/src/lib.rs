//! # acervo-core
//!
//! Core types, traits, and abstractions for the acervo cultural-memory
//! platform.
//!
//! This crate provides the foundational data structures, the granular
//! permission model, and the trait definitions that the database,
//! inference, ingestion, and API crates depend on.

pub mod defaults;
pub mod error;
pub mod json_column;
pub mod media;
pub mod models;
pub mod rbac;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use json_column::{decode_or_default, encode_json};
pub use media::{detect_mime_type, MediaKind};
pub use models::*;
pub use rbac::{authorize, Action, PermissionSet, Resource};
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
