//! Historian Bridge REST API

pub mod historian;
pub mod middleware;
pub mod params;
pub mod tags;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request, Response, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parc_core::HealthStatus;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::Span;
use uuid::Uuid;

use crate::state::AppState;

/// `{ success: true, data }` envelope used by every data route
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

pub fn create_router(state: AppState, frontend_url: &str) -> Router {
    let api = Router::new()
        // Tags
        .route("/tags", get(tags::list))
        .route("/tags/current/batch", post(tags::current_batch))
        .route("/tags/{name}/current", get(tags::current))
        .route("/tags/{name}/history", get(tags::history))
        .route("/tags/{name}/aggregate", get(tags::aggregate))
        .route("/tags/{name}/interpolated", get(tags::interpolated))
        // Multi-tag
        .route("/historian/tags", get(tags::list))
        .route("/historian/query", post(historian::query))
        .route("/historian/dashboard", post(historian::dashboard))
        .route("/historian/cache/reset", post(historian::reset_cache))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ));

    Router::new()
        // Health
        .route("/health", get(health))
        .route("/ready", get(ready))
        .nest("/api", api)
        .fallback(not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::error_detail,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(cors_layer(frontend_url))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        request_id = %Uuid::new_v4(),
                    )
                })
                .on_response(|res: &Response<_>, latency: Duration, _span: &Span| {
                    tracing::info!(
                        http.status = res.status().as_u16(),
                        elapsed_ms = latency.as_millis() as u64,
                        "request handled"
                    );
                }),
        )
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(middleware::API_KEY_HEADER),
        ]);

    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
        Err(e) => {
            tracing::warn!(frontend_url, error = %e, "Invalid FRONTEND_URL, cross-origin requests disabled");
            cors
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::since(state.started))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.readiness().await;
    let code = if status.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
