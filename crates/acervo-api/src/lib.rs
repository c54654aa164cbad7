//! # acervo-api
//!
//! HTTP server for acervo: authentication, the permission guards, memory
//! and lesson plan endpoints, and the AI ingestion routes.

pub mod auth;
pub mod error;
pub mod guards;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::{build_router, build_router_with_origins};
pub use state::{build_rate_limiter, AppState};
