//! API response types
//!
//! One error shape for the whole surface: the taxonomy in
//! `depot_common::error` maps to exactly one status code each, and the body
//! is always `{"error": "<message>"}`. Traversal renders as a generic bad
//! request so probing responses don't distinguish it from malformed input.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use depot_common::DepotError;
use serde::Serialize;

/// Wire error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Application error type that can be converted to HTTP responses
#[derive(Debug)]
pub struct ApiError(pub DepotError);

/// Alias for Result with ApiError
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DepotError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            DepotError::Forbidden(_) | DepotError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            DepotError::NotFound(_) => StatusCode::NOT_FOUND,
            DepotError::AlreadyExists(_)
            | DepotError::InUse(_)
            | DepotError::Conflict(_) => StatusCode::CONFLICT,
            DepotError::Invalid(_) | DepotError::Traversal => StatusCode::BAD_REQUEST,
            DepotError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            DepotError::Storage(detail) => {
                tracing::error!(error = %detail, "storage failure");
                "internal error".to_string()
            },
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<DepotError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}
