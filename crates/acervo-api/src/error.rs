//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<acervo_core::Error> for ApiError {
    fn from(err: acervo_core::Error) -> Self {
        use acervo_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acervo_core::Error;

    #[test]
    fn test_core_errors_map_to_status() {
        let cases = [
            (Error::NotFound("memory".into()), StatusCode::NOT_FOUND),
            (Error::InvalidInput("title".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized("token".into()), StatusCode::UNAUTHORIZED),
            (Error::Forbidden("org".into()), StatusCode::FORBIDDEN),
            (Error::Conflict("slug".into()), StatusCode::CONFLICT),
            (Error::Inference("quota".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Serialization("json".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_upstream_message_is_kept() {
        let err = ApiError::from(Error::Request("Cloudinary upload failed (401)".into()));
        assert!(err.to_string().contains("Cloudinary upload failed"));
    }

    #[tokio::test]
    async fn test_body_shape() {
        let response = ApiError::NotFound("Memory 1".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Memory 1"}));
    }
}
