//! `/api/tags` routes

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use parc_historian_sdk::{AggregateResult, Sample, TagDescriptor};
use serde::Serialize;

use super::params::{self, RangeQuery, TagsRequest};
use super::ApiResponse;
use crate::error::Result;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<TagDescriptor>>>> {
    let tags = state.query.list_tags().await?;
    Ok(ApiResponse::ok(tags))
}

type PathParam = std::result::Result<Path<String>, PathRejection>;
type RangeParams = std::result::Result<Query<RangeQuery>, QueryRejection>;

pub async fn current(
    State(state): State<AppState>,
    path: PathParam,
) -> Result<Json<ApiResponse<Sample>>> {
    let name = params::tag_name(path)?;
    let sample = state.query.current_value(&name).await?;
    Ok(ApiResponse::ok(sample))
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub data: Vec<Sample>,
    pub unresolved: Vec<String>,
}

pub async fn current_batch(
    State(state): State<AppState>,
    body: std::result::Result<Json<TagsRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let request = TagsRequest::from_body(body)?;
    let batch = state.query.current_values(request.tags()?).await?;
    Ok(Json(BatchResponse {
        success: true,
        data: batch.samples,
        unresolved: batch.unresolved,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    path: PathParam,
    query: RangeParams,
) -> Result<Json<ApiResponse<Vec<Sample>>>> {
    let name = params::tag_name(path)?;
    let params = RangeQuery::from_query(query)?;
    let (start, end) = params.range()?;
    let samples = state.query.history(&name, start, end).await?;
    Ok(ApiResponse::ok(samples))
}

pub async fn aggregate(
    State(state): State<AppState>,
    path: PathParam,
    query: RangeParams,
) -> Result<Json<ApiResponse<AggregateResult>>> {
    let name = params::tag_name(path)?;
    let params = RangeQuery::from_query(query)?;
    let (start, end) = params.range()?;
    let result = state
        .query
        .aggregate(&name, start, end, params.kind.as_deref())
        .await?;
    Ok(ApiResponse::ok(result))
}

pub async fn interpolated(
    State(state): State<AppState>,
    path: PathParam,
    query: RangeParams,
) -> Result<Json<ApiResponse<Vec<Sample>>>> {
    let name = params::tag_name(path)?;
    let params = RangeQuery::from_query(query)?;
    let (start, end) = params.range()?;
    let samples = state
        .query
        .interpolated(&name, start, end, params.interval_secs())
        .await?;
    Ok(ApiResponse::ok(samples))
}
