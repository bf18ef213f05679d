//! API error types.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use ytmp3_media::MediaError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Hide internal error details from clients. Set once from [`ApiConfig`].
///
/// [`ApiConfig`]: crate::config::ApiConfig
static PRODUCTION: AtomicBool = AtomicBool::new(false);

pub fn set_production_mode(enabled: bool) {
    PRODUCTION.store(enabled, Ordering::Relaxed);
}

pub(crate) fn production_mode() -> bool {
    PRODUCTION.load(Ordering::Relaxed)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) | ApiError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::RateLimited => Some("rate_limited"),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ApiError {
    fn render(self, production: bool) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) | ApiError::Media(_) if production => {
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: self.code().map(str::to_string),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::RateLimited) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.render(production_mode())
    }
}
