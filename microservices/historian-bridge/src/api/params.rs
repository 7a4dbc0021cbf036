//! Request parameter parsing

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{ApiError, Result};

const TAGS_REQUIRED: &str = "Request body must include a \"tags\" array";
const RANGE_REQUIRED: &str = "\"start\" and \"end\" required";

/// Query string of the ranged read routes
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub interval: Option<String>,
}

impl RangeQuery {
    /// Unwraps the query extractor; a query string that does not fit is a 400
    pub fn from_query(query: std::result::Result<Query<Self>, QueryRejection>) -> Result<Self> {
        let Query(params) = query.map_err(|rejection| {
            tracing::debug!(error = %rejection.body_text(), "Rejected query string");
            ApiError::Validation(rejection.body_text())
        })?;
        Ok(params)
    }

    pub fn range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        match (present(&self.start), present(&self.end)) {
            (Some(start), Some(end)) => parse_range(start, end),
            _ => Err(ApiError::Validation(RANGE_REQUIRED.to_string())),
        }
    }

    /// Interval seconds; anything non-numeric falls through to the default
    pub fn interval_secs(&self) -> Option<u32> {
        self.interval.as_deref().and_then(|raw| raw.trim().parse().ok())
    }
}

/// Body of the multi-tag routes
#[derive(Debug, Default, Deserialize)]
pub struct TagsRequest {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl TagsRequest {
    /// Unwraps the JSON extractor, turning any body problem into a 400
    pub fn from_body(body: std::result::Result<Json<Self>, JsonRejection>) -> Result<Self> {
        let Json(request) = body.map_err(|rejection| {
            tracing::debug!(error = %rejection.body_text(), "Rejected request body");
            ApiError::Validation(TAGS_REQUIRED.to_string())
        })?;
        Ok(request)
    }

    pub fn tags(&self) -> Result<&[String]> {
        match self.tags.as_deref() {
            Some(tags) if !tags.is_empty() => Ok(tags),
            _ => Err(ApiError::Validation(TAGS_REQUIRED.to_string())),
        }
    }

    /// The range only when both ends were sent; a lone bound is ignored
    pub fn optional_range(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        match (present(&self.start), present(&self.end)) {
            (Some(start), Some(end)) => parse_range(start, end).map(Some),
            _ => Ok(None),
        }
    }
}

/// Tag name segment of the single-tag routes
pub fn tag_name(path: std::result::Result<Path<String>, PathRejection>) -> Result<String> {
    let Path(name) = path.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected path");
        ApiError::Validation(rejection.body_text())
    })?;
    Ok(name)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_range(start: &str, end: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_timestamp("start", start)?;
    let end = parse_timestamp("end", end)?;
    if start > end {
        return Err(ApiError::Validation(
            "\"start\" must not be after \"end\"".to_string(),
        ));
    }
    Ok((start, end))
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::Validation(format!(
                "\"{}\" must be an ISO-8601 timestamp, got {:?}",
                field, raw
            ))
        })
}
