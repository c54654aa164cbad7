//! Model output post-processing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use acervo_core::defaults;
use acervo_core::{AnalysisType, Error, Result, StructuredMemory};

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse the first JSON object in a model response.
///
/// Fences are stripped first; if prose still surrounds the object, the
/// outermost braces are used.
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let text = strip_code_fences(raw);
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) else {
                return Err(Error::Serialization(format!(
                    "Model output is not JSON: {}",
                    first_err
                )));
            };
            if close <= open {
                return Err(Error::Serialization(format!(
                    "Model output is not JSON: {}",
                    first_err
                )));
            }
            serde_json::from_str(&text[open..=close])
                .map_err(|e| Error::Serialization(format!("Model output is not valid JSON: {}", e)))
        }
    }
}

/// Parse a structured memory. Tags given as one comma-separated string
/// are split.
pub fn parse_structured_memory(raw: &str) -> Result<StructuredMemory> {
    let mut value: JsonValue = parse_json_object(raw)?;
    if let Some(tags) = value.get_mut("tags") {
        if let JsonValue::String(joined) = tags {
            let split: Vec<JsonValue> = joined
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| JsonValue::String(t.to_string()))
                .collect();
            *tags = JsonValue::Array(split);
        } else if tags.is_null() {
            *tags = JsonValue::Array(Vec::new());
        }
    }
    let mut memory: StructuredMemory = serde_json::from_value(value)?;
    memory.tags.retain(|t| !t.trim().is_empty());
    Ok(memory)
}

/// Provenance attached to link-ingested memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetadata {
    pub source: String,
    pub original_url: String,
    pub original_title: String,
    pub analysis_type: AnalysisType,
}

impl LinkMetadata {
    pub fn youtube(original_url: &str, original_title: &str, analysis_type: AnalysisType) -> Self {
        Self {
            source: defaults::LINK_SOURCE_YOUTUBE.to_string(),
            original_url: original_url.to_string(),
            original_title: original_title.to_string(),
            analysis_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```JSON\n{}"), "{}");
    }

    #[test]
    fn test_parse_structured_memory_fenced() {
        let raw = "```json\n{\"title\":\"Festa Junina\",\"description\":\"Quadrilha\",\"date\":\"1985\",\"location\":null,\"tags\":[\"festa\",\" \"],\"chapters\":[{\"time\":\"00:10\",\"title\":\"Abertura\"}]}\n```";
        let memory = parse_structured_memory(raw).unwrap();
        assert_eq!(memory.title, "Festa Junina");
        assert_eq!(memory.date.as_deref(), Some("1985"));
        assert_eq!(memory.tags, vec!["festa"]);
        assert_eq!(memory.chapters.len(), 1);
        assert_eq!(memory.chapters[0].title, "Abertura");
    }

    #[test]
    fn test_parse_structured_memory_with_prose() {
        let raw = "Claro! Aqui está:\n{\"title\":\"Feira\",\"tags\":\"feira, comércio ,\"}\nEspero ter ajudado.";
        let memory = parse_structured_memory(raw).unwrap();
        assert_eq!(memory.title, "Feira");
        assert_eq!(memory.tags, vec!["feira", "comércio"]);
        assert!(memory.description.is_empty());
    }

    #[test]
    fn test_chapter_aliases() {
        let raw = r#"{"title":"t","chapters":[{"timestamp":"01:00","label":"Parte"}]}"#;
        let memory = parse_structured_memory(raw).unwrap();
        assert_eq!(memory.chapters[0].time, "01:00");
        assert_eq!(memory.chapters[0].title, "Parte");
    }

    #[test]
    fn test_unparseable_output_is_serialization_error() {
        let err = parse_structured_memory("I cannot help with that.").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        let err = parse_structured_memory("} nope {").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_link_metadata_wire_shape() {
        let meta = LinkMetadata::youtube("https://youtu.be/x", "Vídeo", AnalysisType::MultimodalVisual);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["source"], "YouTube");
        assert_eq!(json["originalUrl"], "https://youtu.be/x");
        assert_eq!(json["originalTitle"], "Vídeo");
        assert_eq!(json["analysisType"], "multimodal_visual");
    }
}
