//! Shared-secret guard for write endpoints.

use axum::http::HeaderMap;

use crate::error::ApiError;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares a request's token with the configured secret.
///
/// With no secret configured every request passes. An empty secret is still
/// a secret: requests that send no token at all are refused.
#[derive(Clone, Default)]
pub struct TokenGuard {
    secret: Option<String>,
}

impl TokenGuard {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// The header token wins over the query token when both are present.
    pub fn check(&self, header: Option<&str>, query: Option<&str>) -> Result<(), ApiError> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };

        let provided = header.filter(|h| !h.is_empty()).or(query);
        if provided == Some(secret) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    /// Check against the `X-API-Key` header and an optional `?token=` value.
    pub fn check_request(&self, headers: &HeaderMap, query: Option<&str>) -> Result<(), ApiError> {
        let header = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        self.check(header, query)
    }
}

impl std::fmt::Debug for TokenGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGuard")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
