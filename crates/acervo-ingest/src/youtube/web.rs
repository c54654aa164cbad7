//! Transcript and watch-page access over the public site.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use acervo_core::defaults;
use acervo_core::{Error, Result};

use super::captions::{parse_timedtext, Transcript};
use super::{thumbnail_candidates, TranscriptSource, WatchPage, WatchPageSource};

static SHORT_DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""shortDescription":("(?:[^"\\]|\\.)*")"#).expect("valid description regex")
});

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    /// `asr` for auto-generated tracks.
    kind: Option<String>,
}

/// Locate the JSON array stored under `"key":` in a page and return it
/// verbatim, brackets included.
fn extract_json_array<'a>(page: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("\"{}\":", key);
    let start = page.find(&marker)? + marker.len();
    let rest = &page[start..];
    let open = rest.find('[')?;
    if !rest[..open].trim().is_empty() {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in rest[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&rest[open..open + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pick a track: preferred languages in order, manual before auto-generated.
fn choose_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    let is_manual = |t: &&CaptionTrack| t.kind.as_deref() != Some("asr");
    for lang in languages {
        let matching = |t: &&CaptionTrack| t.language_code.eq_ignore_ascii_case(lang);
        if let Some(track) = tracks.iter().filter(matching).find(is_manual) {
            return Some(track);
        }
        if let Some(track) = tracks.iter().find(matching) {
            return Some(track);
        }
    }
    tracks.iter().find(is_manual).or_else(|| tracks.first())
}

fn parse_short_description(page: &str) -> Option<String> {
    let quoted = SHORT_DESCRIPTION_RE.captures(page)?.get(1)?.as_str();
    serde_json::from_str::<String>(quoted)
        .ok()
        .filter(|d| !d.trim().is_empty())
}

pub struct YouTubeWebClient {
    client: Client,
    base_url: String,
    languages: Vec<String>,
}

impl YouTubeWebClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (compatible; acervo/1.0)")
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            languages: defaults::TRANSCRIPT_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
        })
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<String>> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Request(format!("{} returned {}", url, status)));
        }
        Ok(Some(response.text().await?))
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Transcript> {
        let xml = self.get_text(&track.base_url, &[]).await?.unwrap_or_default();
        let mut transcript = parse_timedtext(&xml);
        transcript.language = Some(track.language_code.clone());
        Ok(transcript)
    }
}

#[async_trait]
impl TranscriptSource for YouTubeWebClient {
    async fn transcript(&self, video_id: &str) -> Result<Option<Transcript>> {
        let url = format!("{}/api/timedtext", self.base_url);
        let mut last_error = None;
        let mut answered = false;
        for lang in &self.languages {
            let xml = match self
                .get_text(&url, &[("v", video_id), ("lang", lang.as_str())])
                .await
            {
                Ok(Some(xml)) => xml,
                Ok(None) => {
                    answered = true;
                    continue;
                }
                Err(e) => {
                    warn!(
                        subsystem = "ingest",
                        component = "youtube_web",
                        video_id,
                        lang = %lang,
                        error = %e,
                        "Transcript request failed, trying next language"
                    );
                    last_error = Some(e);
                    continue;
                }
            };
            answered = true;
            let mut transcript = parse_timedtext(&xml);
            if !transcript.is_empty() {
                transcript.language = Some(lang.clone());
                debug!(
                    subsystem = "ingest",
                    component = "youtube_web",
                    video_id,
                    lang = %lang,
                    segments = transcript.segments.len(),
                    "Transcript found"
                );
                return Ok(Some(transcript));
            }
        }
        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl WatchPageSource for YouTubeWebClient {
    async fn capture(&self, video_id: &str) -> Result<WatchPage> {
        let page = self
            .get_text(
                &format!("{}/watch", self.base_url),
                &[("v", video_id), ("hl", "pt")],
            )
            .await?
            .ok_or_else(|| Error::NotFound(format!("Watch page for {} not found", video_id)))?;

        let tracks: Vec<CaptionTrack> = extract_json_array(&page, "captionTracks")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        let transcript = match choose_track(&tracks, &self.languages) {
            Some(track) => match self.fetch_track(track).await {
                Ok(transcript) => (!transcript.is_empty()).then_some(transcript),
                Err(e) => {
                    warn!(
                        subsystem = "ingest",
                        component = "youtube_web",
                        video_id,
                        lang = %track.language_code,
                        error = %e,
                        "Caption track download failed"
                    );
                    None
                }
            },
            None => None,
        };

        debug!(
            subsystem = "ingest",
            component = "youtube_web",
            video_id,
            caption_tracks = tracks.len(),
            recovered_transcript = transcript.is_some(),
            "Captured watch page"
        );

        Ok(WatchPage {
            transcript,
            description: parse_short_description(&page),
            thumbnail_url: thumbnail_candidates(video_id).into_iter().next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://example.test/api/timedtext?v=x&lang=en","name":{"runs":[{"text":"English [auto]"}]},"languageCode":"en","kind":"asr"},{"baseUrl":"https://example.test/api/timedtext?v=x&lang=pt","name":{"runs":[{"text":"Português"}]},"languageCode":"pt"}],"audioTracks":[]}},"videoDetails":{"shortDescription":"Linha um\nLinha \"dois\""}};</script>"#;

    #[test]
    fn test_extract_caption_tracks_with_nested_arrays() {
        let raw = extract_json_array(PAGE, "captionTracks").unwrap();
        let tracks: Vec<CaptionTrack> = serde_json::from_str(raw).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].base_url, "https://example.test/api/timedtext?v=x&lang=en");
    }

    #[test]
    fn test_missing_key() {
        assert!(extract_json_array("<html></html>", "captionTracks").is_none());
    }

    #[test]
    fn test_choose_track_prefers_language_then_manual() {
        let raw = extract_json_array(PAGE, "captionTracks").unwrap();
        let tracks: Vec<CaptionTrack> = serde_json::from_str(raw).unwrap();

        let pt = choose_track(&tracks, &["pt".into()]).unwrap();
        assert_eq!(pt.language_code, "pt");

        let en = choose_track(&tracks, &["en".into()]).unwrap();
        assert_eq!(en.kind.as_deref(), Some("asr"));

        let fallback = choose_track(&tracks, &["fr".into()]).unwrap();
        assert_eq!(fallback.language_code, "pt");

        assert!(choose_track(&[], &["pt".into()]).is_none());
    }

    #[test]
    fn test_short_description_unescaped() {
        assert_eq!(
            parse_short_description(PAGE).as_deref(),
            Some("Linha um\nLinha \"dois\"")
        );
    }
}
