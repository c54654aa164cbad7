//! Waiting for uploaded files to become usable.
//!
//! Uploaded media is processed asynchronously by the provider. The poll is
//! a fixed-interval loop with a hard attempt cap; `FAILED` ends it at once.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use acervo_core::defaults;
use acervo_core::{Error, FileApi, RemoteFile, RemoteFileState, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    /// 4 s x 75 attempts, about five minutes.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::FILE_POLL_INTERVAL_SECS),
            max_attempts: defaults::FILE_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Poll `file` until it is `ACTIVE`.
///
/// Returns `FileProcessing` as soon as the provider reports `FAILED`, and
/// `Timeout` once `max_attempts` lookups have not seen `ACTIVE`.
pub async fn wait_until_active(
    api: &dyn FileApi,
    file: RemoteFile,
    policy: PollPolicy,
) -> Result<RemoteFile> {
    let start = Instant::now();
    let mut current = file;

    for attempt in 0..=policy.max_attempts {
        match current.state {
            RemoteFileState::Active => {
                info!(
                    subsystem = "inference",
                    component = "file_poll",
                    file = %current.name,
                    attempts = attempt,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "File is active"
                );
                return Ok(current);
            }
            RemoteFileState::Failed => {
                warn!(
                    subsystem = "inference",
                    component = "file_poll",
                    file = %current.name,
                    attempts = attempt,
                    "Provider reported file processing FAILED"
                );
                return Err(Error::FileProcessing(format!(
                    "Provider failed to process {}",
                    current.name
                )));
            }
            RemoteFileState::Processing | RemoteFileState::Unspecified => {}
        }

        if attempt == policy.max_attempts {
            break;
        }

        debug!(
            subsystem = "inference",
            component = "file_poll",
            file = %current.name,
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            "File not ready, waiting"
        );
        tokio::time::sleep(policy.interval).await;
        current = api.get(&current.name).await?;
    }

    warn!(
        subsystem = "inference",
        component = "file_poll",
        file = %current.name,
        max_attempts = policy.max_attempts,
        duration_ms = start.elapsed().as_millis() as u64,
        "File did not become active in time"
    );
    Err(Error::Timeout(format!(
        "{} not active after {} attempts",
        current.name, policy.max_attempts
    )))
}
