//! `/api/historian` routes: multi-tag reads and cache control

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::params::TagsRequest;
use super::ApiResponse;
use crate::error::Result;
use crate::fanout::{self, DashboardEntry, QueryData, TagOutcome};
use crate::state::AppState;

pub async fn query(
    State(state): State<AppState>,
    body: std::result::Result<Json<TagsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<TagOutcome<QueryData>>>>> {
    let request = TagsRequest::from_body(body)?;
    let tags = request.tags()?;
    let range = request.optional_range()?;

    let outcomes = fanout::query_tags(&state.query, tags, range).await;
    Ok(ApiResponse::ok(outcomes))
}

pub async fn dashboard(
    State(state): State<AppState>,
    body: std::result::Result<Json<TagsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<DashboardEntry>>>> {
    let request = TagsRequest::from_body(body)?;
    let tags = request.tags()?;

    let entries = fanout::dashboard(&state.query, tags, state.dashboard, Utc::now()).await;
    Ok(ApiResponse::ok(entries))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReset {
    pub cleared_tags: usize,
}

/// Drops the tag directory and the cached credential; the next read reloads both
pub async fn reset_cache(State(state): State<AppState>) -> Json<ApiResponse<CacheReset>> {
    let cleared_tags = state.query.directory().reset().await;
    state.query.client().credentials().clear();
    info!(cleared_tags, "Historian caches reset");
    ApiResponse::ok(CacheReset { cleared_tags })
}
