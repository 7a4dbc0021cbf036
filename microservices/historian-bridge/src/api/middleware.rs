//! Request middleware

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use serde_json::json;

use crate::error::ErrorDetail;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects `/api/*` calls without the configured key. No key configured
/// means the check is off.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_ref() else {
        return next.run(request).await;
    };

    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| keys_match(key.as_bytes(), expected.expose_secret().as_bytes()));

    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "message": "Unauthorized: Invalid or missing API key",
        })),
    )
        .into_response()
}

/// Byte comparison that does not stop at the first mismatch
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Adds `detail` to 5xx bodies outside production
pub async fn error_detail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if state.environment.is_production() {
        return response;
    }
    let Some(ErrorDetail(detail)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    let status = response.status();
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer error body");
            return (status, Json(json!({ "success": false, "detail": detail }))).into_response();
        }
    };

    let mut envelope: serde_json::Value =
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({ "success": false }));
    if let Some(object) = envelope.as_object_mut() {
        object.insert("detail".to_string(), json!(detail));
    }

    let body = envelope.to_string();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::from_parts(parts, Body::from(body))
}
