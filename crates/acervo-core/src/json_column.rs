//! Encode/decode helpers for JSON stored in text columns.
//!
//! Tags, permissions, organization config, and memory metadata are stored
//! as serialized text. Decoding never fails: a missing, empty, or malformed
//! value becomes the type's default and the problem is logged.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Decode a JSON text column, falling back to `T::default()`.
///
/// `column` names the source for the warning emitted on malformed data.
pub fn decode_or_default<T>(raw: Option<&str>, column: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = raw else {
        return T::default();
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return T::default();
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                subsystem = "core",
                component = "json_column",
                column,
                error = %e,
                "Malformed JSON column, using default"
            );
            T::default()
        }
    }
}

/// Encode a value for storage in a JSON text column.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_decode_valid_list() {
        let tags: Vec<String> = decode_or_default(Some(r#"["festa","bairro"]"#), "tags");
        assert_eq!(tags, vec!["festa", "bairro"]);
    }

    #[test]
    fn test_decode_none_is_default() {
        let tags: Vec<String> = decode_or_default(None, "tags");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_decode_blank_and_null_are_default() {
        let a: Vec<String> = decode_or_default(Some("   "), "tags");
        let b: Vec<String> = decode_or_default(Some("null"), "tags");
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn test_decode_malformed_is_default() {
        let map: HashMap<String, Vec<String>> = decode_or_default(Some("{not json"), "permissions");
        assert!(map.is_empty());
    }

    #[test]
    fn test_decode_wrong_shape_is_default() {
        let tags: Vec<String> = decode_or_default(Some(r#"{"a": 1}"#), "tags");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_encode_list() {
        let encoded = encode_json(&vec!["a", "b"]).unwrap();
        assert_eq!(encoded, r#"["a","b"]"#);
    }
}
