//! Historian data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upstream-assigned tag identifier
pub type TagId = i64;

/// Tag metadata as listed by the historian.
///
/// Only `id` and `name` are interpreted; everything else is passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDescriptor {
    pub id: TagId,
    pub name: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// A single reading as returned by the historian read endpoints.
///
/// Rows may carry both a record `id` and a `tagId`, or both `time` and
/// `timestamp`; `tagId` and `time` win. Other keys are ignored.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct UpstreamRecord {
    pub tag_id: Option<TagId>,
    pub value: Value,
    pub time: Value,
    pub status: Value,
    pub quality: Value,
}

impl From<Map<String, Value>> for UpstreamRecord {
    fn from(mut raw: Map<String, Value>) -> Self {
        let tag_id = ["tagId", "id"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_i64));
        let time = match raw.remove("time") {
            Some(time) if !time.is_null() => time,
            _ => raw.remove("timestamp").unwrap_or(Value::Null),
        };
        let mut take = |key: &str| raw.remove(key).unwrap_or(Value::Null);
        Self {
            tag_id,
            value: take("value"),
            time,
            status: take("status"),
            quality: take("quality"),
        }
    }
}

/// Endpoints answer with either one object or an array of them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }

    pub fn into_first(self) -> Option<T> {
        match self {
            Self::Many(items) => items.into_iter().next(),
            Self::One(item) => Some(item),
        }
    }
}

/// Canonical client-facing reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub tag_name: String,
    pub tag_id: TagId,
    pub value: Value,
    pub time: Value,
    pub status: Value,
    pub quality: Value,
}

impl Sample {
    pub fn from_record(tag_name: &str, tag_id: TagId, record: UpstreamRecord) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            tag_id,
            value: record.value,
            time: record.time,
            status: record.status,
            quality: record.quality,
        }
    }
}

/// Statistical summary of a tag over a time range
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub tag_name: String,
    pub tag_id: TagId,
    #[serde(rename = "type")]
    pub kind: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: Value,
    /// Any other fields the historian reported (count, min, max...)
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

const AGGREGATE_RESERVED: [&str; 7] = ["tagName", "tagId", "id", "type", "start", "end", "value"];

impl AggregateResult {
    pub fn from_upstream(
        tag_name: &str,
        tag_id: TagId,
        kind: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mut raw: Map<String, Value>,
    ) -> Self {
        let value = raw.remove("value").unwrap_or(Value::Null);
        for key in AGGREGATE_RESERVED {
            raw.remove(key);
        }
        Self {
            tag_name: tag_name.to_string(),
            tag_id,
            kind: kind.to_string(),
            start,
            end,
            value,
            details: raw,
        }
    }
}

/// Outcome of a batched current-value read
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CurrentBatch {
    pub samples: Vec<Sample>,
    /// Requested names the directory could not resolve
    pub unresolved: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default, rename = "expiresIn", alias = "expires_in")]
    pub expires_in: Option<u64>,
}
