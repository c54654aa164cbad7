//! Caption track parsing.
//!
//! Handles both timedtext layouts: `<text start="12.3" dur="4">` (seconds)
//! and srv3 `<p t="12300" d="4000">` (milliseconds).

use once_cell::sync::Lazy;
use regex::Regex;

static TEXT_NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<text\s+start="([0-9.]+)"[^>]*>(.*?)</text>"#).expect("valid text node regex")
});

static P_NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<p\s+t="([0-9]+)"[^>]*>(.*?)</p>"#).expect("valid p node regex")
});

static INNER_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid inner tag regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }

    /// `[mm:ss] text` lines, cut at `max_chars` on a line boundary.
    pub fn to_timestamped_text(&self, max_chars: usize) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            let line = format!("[{}] {}\n", format_timestamp(segment.start_secs), segment.text);
            if out.len() + line.len() > max_chars {
                break;
            }
            out.push_str(&line);
        }
        out.trim_end().to_string()
    }

    /// Caption text without timestamps.
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `mm:ss`, or `h:mm:ss` past the hour.
pub fn format_timestamp(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;#39;", "'")
        .replace("&amp;quot;", "\"")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn clean_segment(raw: &str) -> String {
    let decoded = decode_entities(raw);
    let stripped = INNER_TAG_RE.replace_all(&decoded, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a timedtext XML document. Empty segments are skipped.
pub fn parse_timedtext(xml: &str) -> Transcript {
    let mut segments: Vec<TranscriptSegment> = TEXT_NODE_RE
        .captures_iter(xml)
        .filter_map(|c| {
            let start_secs = c.get(1)?.as_str().parse::<f64>().ok()?;
            Some(TranscriptSegment {
                start_secs,
                text: clean_segment(c.get(2)?.as_str()),
            })
        })
        .collect();

    if segments.is_empty() {
        segments = P_NODE_RE
            .captures_iter(xml)
            .filter_map(|c| {
                let millis = c.get(1)?.as_str().parse::<u64>().ok()?;
                Some(TranscriptSegment {
                    start_secs: millis as f64 / 1000.0,
                    text: clean_segment(c.get(2)?.as_str()),
                })
            })
            .collect();
    }

    segments.retain(|s| !s.text.is_empty());
    Transcript {
        language: None,
        segments,
    }
}
