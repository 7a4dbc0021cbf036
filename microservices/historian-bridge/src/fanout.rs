//! Multi-tag fan-out
//!
//! Every tag gets its own slot. A failing tag is reported in its slot and
//! never aborts its siblings; all reads are joined before returning.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parc_historian_sdk::{HistorianQuery, Sample};
use serde::Serialize;
use tracing::debug;

use crate::config::DashboardWindow;

/// Per-tag slot of a multi-tag query
#[derive(Debug, Clone, Serialize)]
pub struct TagOutcome<T> {
    pub tag: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> TagOutcome<T> {
    fn from_result<E: std::fmt::Display>(tag: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self {
                tag: tag.to_string(),
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self {
                tag: tag.to_string(),
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// What a query slot carries: a range read or a single current value
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    History(Vec<Sample>),
    Current(Sample),
}

/// Per-tag slot of a dashboard read
#[derive(Debug, Clone, Serialize)]
pub struct DashboardEntry {
    pub tag: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Sample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Vec<Sample>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// History per tag when a range is given, the current value otherwise
pub async fn query_tags(
    query: &HistorianQuery,
    tags: &[String],
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<TagOutcome<QueryData>> {
    let reads = tags.iter().map(|tag| async move {
        let result = match range {
            Some((start, end)) => query.history(tag, start, end).await.map(QueryData::History),
            None => query.current_value(tag).await.map(QueryData::Current),
        };
        TagOutcome::from_result(tag, result)
    });

    let outcomes = join_all(reads).await;
    debug!(
        tags = outcomes.len(),
        failed = outcomes.iter().filter(|o| !o.success).count(),
        ranged = range.is_some(),
        "Multi-tag query complete"
    );
    outcomes
}

/// Current value plus trailing trend per tag.
///
/// A tag succeeds only if both of its reads do; otherwise its slot carries
/// the first error, current before trend.
pub async fn dashboard(
    query: &HistorianQuery,
    tags: &[String],
    window: DashboardWindow,
    now: DateTime<Utc>,
) -> Vec<DashboardEntry> {
    let lookback = chrono::Duration::from_std(window.lookback)
        .unwrap_or_else(|_| chrono::Duration::hours(1));
    let start = now - lookback;

    let reads = tags.iter().map(|tag| async move {
        let (current, trend) = tokio::join!(
            query.current_value(tag),
            query.interpolated(tag, start, now, Some(window.interval_secs)),
        );

        match (current, trend) {
            (Ok(current), Ok(trend)) => DashboardEntry {
                tag: tag.clone(),
                success: true,
                current: Some(current),
                trend: Some(trend),
                error: None,
            },
            (Err(e), _) | (_, Err(e)) => DashboardEntry {
                tag: tag.clone(),
                success: false,
                current: None,
                trend: None,
                error: Some(e.to_string()),
            },
        }
    });

    let entries = join_all(reads).await;
    debug!(
        tags = entries.len(),
        failed = entries.iter().filter(|e| !e.success).count(),
        "Dashboard read complete"
    );
    entries
}
