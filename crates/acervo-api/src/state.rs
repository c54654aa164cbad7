//! Shared application state.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};

use acervo_core::{defaults, GenerationBackend};
use acervo_db::Database;
use acervo_ingest::{LinkIngestor, SubmissionProcessor};

/// Global rate limiter type (direct quota, no per-client bucketing).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Text generation for lesson plans and social posts.
    pub backend: Arc<dyn GenerationBackend>,
    pub links: Arc<LinkIngestor>,
    pub submissions: Arc<SubmissionProcessor>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
    pub token_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(
        db: Database,
        backend: Arc<dyn GenerationBackend>,
        links: Arc<LinkIngestor>,
        submissions: Arc<SubmissionProcessor>,
    ) -> Self {
        Self {
            db,
            backend,
            links,
            submissions,
            rate_limiter: None,
            token_ttl: chrono::Duration::hours(defaults::TOKEN_TTL_HOURS),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

/// `requests` per `period_secs`, or `None` when either is zero.
pub fn build_rate_limiter(requests: u64, period_secs: u64) -> Option<Arc<GlobalRateLimiter>> {
    let burst = NonZeroU32::new(u32::try_from(requests).unwrap_or(u32::MAX))?;
    let quota = Quota::with_period(Duration::from_secs(period_secs))?.allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_disables_rate_limiter() {
        assert!(build_rate_limiter(0, 60).is_none());
        assert!(build_rate_limiter(100, 0).is_none());
    }

    #[test]
    fn test_burst_is_enforced() {
        let limiter = build_rate_limiter(2, 3600).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
