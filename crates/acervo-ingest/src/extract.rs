//! Local text extraction for documents.
//!
//! Word documents go through `pandoc -t plain`; plain text is decoded as
//! UTF-8 with lossy replacement.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use acervo_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use acervo_core::{Error, Result};

use crate::temp::ScratchFile;

/// Converts Word documents to plain text.
#[async_trait]
pub trait WordExtractor: Send + Sync {
    async fn extract(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String>;

    async fn health_check(&self) -> Result<bool>;
}

/// Run a command with a timeout, returning stdout as a string.
///
/// The child is killed when the timeout fires.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "External command timed out after {}s",
                timeout_secs
            ))
        })?
        .map_err(|e| Error::Internal(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Internal(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pandoc input format for a Word upload. Legacy binary `.doc` has none.
fn pandoc_word_format(filename: &str, mime_type: &str) -> Option<&'static str> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match (ext.as_str(), mime_type) {
        ("docx", _) => Some("docx"),
        ("odt", _) | (_, "application/vnd.oasis.opendocument.text") => Some("odt"),
        (_, "application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
            Some("docx")
        }
        _ => None,
    }
}

pub struct PandocExtractor {
    timeout_secs: u64,
}

impl PandocExtractor {
    pub fn new() -> Self {
        Self {
            timeout_secs: EXTRACTION_CMD_TIMEOUT_SECS,
        }
    }
}

impl Default for PandocExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WordExtractor for PandocExtractor {
    async fn extract(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot convert empty document".to_string(),
            ));
        }
        let format = pandoc_word_format(filename, mime_type).ok_or_else(|| {
            Error::FileProcessing(format!("No text converter for {} ({})", filename, mime_type))
        })?;

        let scratch = ScratchFile::write(data, &format!(".{}", format))?;
        let start = Instant::now();

        // pandoc -f FORMAT -t plain --wrap=none INPUT
        let result = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg(format)
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(scratch.path()),
            self.timeout_secs,
        )
        .await;
        scratch.remove();

        let text = result?;
        debug!(
            subsystem = "ingest",
            component = "extract",
            filename,
            format,
            chars = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Converted with pandoc"
        );
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pandoc").arg("--version").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }
}

/// Decode a plain-text upload. Invalid UTF-8 is replaced, a BOM is dropped.
pub fn decode_plain_text(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.trim_start_matches('\u{feff}').to_string()
}
