//! MIME classification for uploaded media.

use serde::{Deserialize, Serialize};

/// Word-processing MIME types accepted for text extraction.
pub const WORD_MIME_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
];

/// Coarse media family of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Pdf,
    WordDocument,
    PlainText,
    Other,
}

impl MediaKind {
    /// Classify a MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime == "application/pdf" {
            MediaKind::Pdf
        } else if WORD_MIME_TYPES.contains(&mime.as_str()) {
            MediaKind::WordDocument
        } else if mime == "text/plain" {
            MediaKind::PlainText
        } else {
            MediaKind::Other
        }
    }
}

/// Resolve the effective MIME type of an upload.
///
/// A specific claimed type is trusted. When the client sent nothing useful
/// (`application/octet-stream` or empty), magic bytes are sniffed, then the
/// filename extension is consulted.
pub fn detect_mime_type(filename: &str, data: &[u8], claimed: &str) -> String {
    let claimed = claimed.trim();
    if !claimed.is_empty() && claimed != "application/octet-stream" {
        return claimed.to_string();
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" => "text/plain",
        "doc" => "application/msword",
        "docx" => WORD_MIME_TYPES[0],
        _ => "application/octet-stream",
    }
    .to_string()
}
