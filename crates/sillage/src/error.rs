//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::media::MediaError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or missing token")]
    Unauthorized,

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("payload too large: {0}")]
    TooLarge(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("not found")]
    NotFound,
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidFilename(_) => ApiError::validation("file", err.to_string()),
            MediaError::Io { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation { field, message } => {
                warn!(%field, %message, "rejected request");
                json!({ "detail": message, "field": field })
            }
            ApiError::Internal(message) => {
                error!(%message, "request failed");
                json!({ "detail": self.to_string() })
            }
            _ => json!({ "detail": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::path::PathBuf;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let (status, json) = body_json(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["detail"], "Invalid or missing token");
    }

    #[tokio::test]
    async fn test_validation_response_names_field() {
        let (status, json) = body_json(ApiError::validation("lat", "not a number")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["field"], "lat");
        assert_eq!(json["detail"], "not a number");
    }

    #[tokio::test]
    async fn test_media_io_error_is_internal() {
        let err = ApiError::from(MediaError::Io {
            path: PathBuf::from("uploads/a.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = json["detail"].as_str().unwrap();
        assert!(detail.starts_with("internal error"));
        assert!(detail.contains("denied"));
    }

    #[test]
    fn test_invalid_filename_is_validation() {
        let err = ApiError::from(MediaError::InvalidFilename("..".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
