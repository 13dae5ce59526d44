use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use briklyst_core::error::CoreError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Validation failure tied to a specific request field.
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited")]
    RateLimited,

    #[error("rate limited")]
    RateLimitedWithRetry { retry_after_seconds: u64 },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, message } => AppError::Invalid { field, message },
            CoreError::InvalidRange(msg) => AppError::Invalid {
                field: "range",
                message: msg,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, field, retry_after_seconds) = match &self {
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found", msg.as_str(), None, None)
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.as_str(),
                None,
                None,
            ),
            AppError::Invalid { field, message } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.as_str(),
                Some(*field),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized",
                None,
                None,
            ),
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, "conflict", msg.as_str(), None, None)
            }
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded",
                None,
                None,
            ),
            AppError::RateLimitedWithRetry {
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many failed login attempts",
                None,
                Some(*retry_after_seconds),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                    None,
                    None,
                )
            }
        };

        let mut response = (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": field
                }
            })),
        )
            .into_response();

        if let Some(retry_after_seconds) = retry_after_seconds {
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_validation_keeps_field() {
        let err: AppError = CoreError::validation("slug", "slug must be 3-40 characters").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn retry_after_header_is_set() {
        let response = AppError::RateLimitedWithRetry {
            retry_after_seconds: 900,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("900")
        );
    }
}
