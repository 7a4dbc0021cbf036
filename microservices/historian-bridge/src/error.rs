//! Error types for Historian Bridge

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parc_historian_sdk::HistorianError;
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Request-level failures rendered as `{ success: false, message }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Historian(#[from] HistorianError),
}

/// Diagnostic attached to 5xx responses.
///
/// The error-detail middleware folds it into the body outside production.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Historian(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Historian(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ApiError::Validation(_) => None,
            ApiError::Historian(e) if e.is_not_found() => None,
            ApiError::Historian(e) => Some(format!("{:?}", e)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {:?}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let Some(detail) = self.detail() {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}
