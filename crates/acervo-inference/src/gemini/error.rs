//! Gemini-specific error handling.

use acervo_core::Error;

use super::types::GeminiErrorResponse;

/// Gemini error classes, derived from HTTP status and the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiErrorCode {
    InvalidApiKey,
    PermissionDenied,
    RateLimitExceeded,
    ModelNotFound,
    InvalidArgument,
    ServerError,
    Unknown,
}

impl GeminiErrorCode {
    pub fn from_response(status: u16, status_text: &str) -> Self {
        match (status, status_text) {
            (400, _) if status_text == "FAILED_PRECONDITION" => Self::PermissionDenied,
            (401, _) | (_, "UNAUTHENTICATED") => Self::InvalidApiKey,
            (403, _) | (_, "PERMISSION_DENIED") => Self::PermissionDenied,
            (429, _) | (_, "RESOURCE_EXHAUSTED") => Self::RateLimitExceeded,
            (404, _) | (_, "NOT_FOUND") => Self::ModelNotFound,
            (400, _) | (_, "INVALID_ARGUMENT") => Self::InvalidArgument,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

pub fn to_acervo_error(code: GeminiErrorCode, message: &str) -> Error {
    match code {
        GeminiErrorCode::InvalidApiKey => Error::Config(format!("Gemini rejected the API key: {}", message)),
        GeminiErrorCode::PermissionDenied => Error::Config(format!("Gemini permission denied: {}", message)),
        GeminiErrorCode::ModelNotFound => Error::Config(format!("Gemini model not found: {}", message)),
        GeminiErrorCode::RateLimitExceeded => Error::Inference(format!("Gemini rate limit exceeded: {}", message)),
        GeminiErrorCode::InvalidArgument => Error::Inference(format!("Gemini rejected the request: {}", message)),
        GeminiErrorCode::ServerError => Error::Inference(format!("Gemini server error: {}", message)),
        GeminiErrorCode::Unknown => Error::Inference(message.to_string()),
    }
}

/// Turn a non-success response body into an error.
pub(crate) fn error_from_body(status: reqwest::StatusCode, body: &str) -> Error {
    let (status_text, message) = match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(parsed) => (parsed.error.status, parsed.error.message),
        Err(_) => (String::new(), body.chars().take(500).collect()),
    };
    let code = GeminiErrorCode::from_response(status.as_u16(), &status_text);
    to_acervo_error(code, &format!("{} ({})", message, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_statuses() {
        assert_eq!(GeminiErrorCode::from_response(401, ""), GeminiErrorCode::InvalidApiKey);
        assert_eq!(GeminiErrorCode::from_response(429, ""), GeminiErrorCode::RateLimitExceeded);
        assert_eq!(
            GeminiErrorCode::from_response(400, "RESOURCE_EXHAUSTED"),
            GeminiErrorCode::RateLimitExceeded
        );
        assert_eq!(GeminiErrorCode::from_response(404, ""), GeminiErrorCode::ModelNotFound);
        assert_eq!(GeminiErrorCode::from_response(400, "INVALID_ARGUMENT"), GeminiErrorCode::InvalidArgument);
        assert_eq!(GeminiErrorCode::from_response(503, "UNAVAILABLE"), GeminiErrorCode::ServerError);
        assert_eq!(GeminiErrorCode::from_response(418, ""), GeminiErrorCode::Unknown);
    }

    #[test]
    fn test_retryable() {
        assert!(GeminiErrorCode::ServerError.is_retryable());
        assert!(!GeminiErrorCode::InvalidApiKey.is_retryable());
    }

    #[test]
    fn test_error_from_json_body() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let err = error_from_body(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, Error::Inference(_)));
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn test_error_from_plain_body() {
        let err = error_from_body(reqwest::StatusCode::BAD_GATEWAY, "upstream exploded");
        assert!(matches!(err, Error::Inference(_)));
        assert!(err.to_string().contains("upstream exploded"));
    }
}
