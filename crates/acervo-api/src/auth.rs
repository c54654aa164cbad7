//! Bearer-token authentication and password hashing.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use acervo_core::{defaults, IssuedToken, LegacyRole, TokenRepository, UserAccess, UserRepository};
use acervo_db::tokens::hash_token;

use crate::{ApiError, AppState};

const TOKEN_RANDOM_LEN: usize = 40;

/// Hash a password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored PHC string. Unparseable hashes never verify.
pub fn verify_password(password: &str, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// New opaque bearer token: prefix plus random alphanumerics.
pub fn generate_token() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", defaults::TOKEN_PREFIX, random)
}

/// Token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Issue and persist a token for a user.
pub async fn issue_token(state: &AppState, user_id: Uuid) -> Result<IssuedToken, ApiError> {
    let token = generate_token();
    let expires_at = Utc::now() + state.token_ttl;
    state
        .db
        .tokens
        .insert(user_id, &hash_token(&token), expires_at)
        .await?;
    Ok(IssuedToken {
        access_token: token,
        token_type: "Bearer",
        expires_at,
    })
}

/// Extractor for authenticated requests.
///
/// Resolves the bearer token to the user, its granular role and the state
/// of its organization. Requests from inactive organizations are rejected
/// with 403. The resolved user is cached in the request extensions so
/// guards and handlers share one lookup.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub access: UserAccess,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.access.user.id
    }

    pub fn organization_id(&self) -> Uuid {
        self.access.user.organization_id
    }

    pub fn role(&self) -> LegacyRole {
        self.access.user.role
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<AuthUser>() {
            return Ok(cached.clone());
        }

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;
        if !token.starts_with(defaults::TOKEN_PREFIX) {
            return Err(ApiError::Unauthorized("Invalid token".to_string()));
        }

        let user_id = state
            .db
            .tokens
            .user_for_token(&hash_token(token))
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
        let access = state
            .db
            .users
            .fetch_access(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        if !access.organization_active {
            tracing::warn!(
                user_id = %access.user.id,
                organization_id = %access.user.organization_id,
                "Request from inactive organization rejected"
            );
            return Err(ApiError::Forbidden("Organization is inactive".to_string()));
        }

        let user = AuthUser { access };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn test_generated_tokens_are_prefixed_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert!(a.starts_with(defaults::TOKEN_PREFIX));
        assert_eq!(a.len(), defaults::TOKEN_PREFIX.len() + TOKEN_RANDOM_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer ac_at_xyz"));
        assert_eq!(bearer_token(&headers), Some("ac_at_xyz"));
    }
}
