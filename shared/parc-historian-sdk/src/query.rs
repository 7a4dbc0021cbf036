//! Name-keyed reads on top of the ID-addressed historian API

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::{AggregateResult, CurrentBatch, Sample, TagDescriptor, TagId};
use crate::{HistorianClient, HistorianError, Result, TagDirectory};

pub const DEFAULT_AGGREGATE: &str = "average";
pub const DEFAULT_INTERVAL_SECS: u32 = 60;

#[derive(Clone)]
pub struct HistorianQuery {
    client: Arc<HistorianClient>,
    directory: Arc<TagDirectory>,
}

impl HistorianQuery {
    pub fn new(client: Arc<HistorianClient>, directory: Arc<TagDirectory>) -> Self {
        Self { client, directory }
    }

    pub fn client(&self) -> &Arc<HistorianClient> {
        &self.client
    }

    pub fn directory(&self) -> &Arc<TagDirectory> {
        &self.directory
    }

    pub async fn list_tags(&self) -> Result<Vec<TagDescriptor>> {
        self.directory.list_all().await
    }

    pub async fn current_value(&self, name: &str) -> Result<Sample> {
        let id = self.directory.resolve(name).await?;
        let record = self
            .client
            .current(id)
            .await?
            .into_first()
            .ok_or_else(|| HistorianError::Empty(name.to_string()))?;
        Ok(Sample::from_record(name, id, record))
    }

    /// One batched upstream read for every resolvable name.
    ///
    /// Unknown names are reported in `unresolved` and never sent upstream.
    /// Resolved tags the historian has no row for are simply absent.
    pub async fn current_values(&self, names: &[String]) -> Result<CurrentBatch> {
        let resolution = self.directory.resolve_many(names).await?;
        if !resolution.unresolved.is_empty() {
            debug!(unresolved = ?resolution.unresolved, "Dropping unknown tags from batch");
        }
        if resolution.resolved.is_empty() {
            return Ok(CurrentBatch {
                samples: Vec::new(),
                unresolved: resolution.unresolved,
            });
        }

        let mut by_id: HashMap<TagId, &str> = HashMap::with_capacity(resolution.resolved.len());
        let mut ids = Vec::with_capacity(resolution.resolved.len());
        for (name, id) in &resolution.resolved {
            if by_id.insert(*id, name.as_str()).is_none() {
                ids.push(*id);
            }
        }

        let rows = self.client.snapshot(&ids).await?.into_vec();
        let mut samples = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.tag_id else {
                warn!("Snapshot row without tag id ignored");
                continue;
            };
            match by_id.get(&id) {
                Some(name) => samples.push(Sample::from_record(name, id, row)),
                None => debug!(tag_id = id, "Snapshot row for unrequested tag ignored"),
            }
        }

        Ok(CurrentBatch {
            samples,
            unresolved: resolution.unresolved,
        })
    }

    pub async fn history(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>> {
        let id = self.directory.resolve(name).await?;
        let rows = self.client.history(id, start, end).await?.into_vec();
        Ok(rows
            .into_iter()
            .map(|row| Sample::from_record(name, id, row))
            .collect())
    }

    /// `kind` falls back to [`DEFAULT_AGGREGATE`] when absent or blank
    pub async fn aggregate(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        kind: Option<&str>,
    ) -> Result<AggregateResult> {
        let kind = kind
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_AGGREGATE);
        let id = self.directory.resolve(name).await?;
        let raw = self
            .client
            .aggregate(id, start, end, kind)
            .await?
            .into_first()
            .ok_or_else(|| HistorianError::Empty(name.to_string()))?;
        Ok(AggregateResult::from_upstream(name, id, kind, start, end, raw))
    }

    /// `interval_secs` falls back to [`DEFAULT_INTERVAL_SECS`] when absent or zero
    pub async fn interpolated(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval_secs: Option<u32>,
    ) -> Result<Vec<Sample>> {
        let interval = interval_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let id = self.directory.resolve(name).await?;
        let rows = self
            .client
            .interpolated(id, start, end, interval)
            .await?
            .into_vec();
        Ok(rows
            .into_iter()
            .map(|row| Sample::from_record(name, id, row))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HistorianConfig;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn query_for(server: &MockServer) -> HistorianQuery {
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 135, "name": "OEE"},
                {"id": 140, "name": "Kiln_Temp"}
            ])))
            .mount(server)
            .await;

        let config = HistorianConfig::new(&server.uri(), "bridge", "s3cret").unwrap();
        let client = Arc::new(HistorianClient::new(&config).unwrap());
        let directory = Arc::new(TagDirectory::new(client.clone()));
        HistorianQuery::new(client, directory)
    }

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            "2024-05-01T00:00:00Z".parse().unwrap(),
            "2024-05-01T01:00:00Z".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_current_value_unwraps_array() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tags/135/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tagId": 135, "value": 81.5, "time": "2024-05-01T00:00:00Z", "status": "Good", "quality": 192}
            ])))
            .mount(&server)
            .await;

        let sample = assert_ok!(query.current_value("OEE").await);
        assert_eq!(sample.tag_name, "OEE");
        assert_eq!(sample.tag_id, 135);
        assert_eq!(sample.value, json!(81.5));
        assert_eq!(sample.status, json!("Good"));
    }

    #[tokio::test]
    async fn test_current_value_empty_response() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tags/135/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = assert_err!(query.current_value("OEE").await);
        assert!(matches!(err, HistorianError::Empty(_)));
    }

    #[tokio::test]
    async fn test_unknown_tag_never_reaches_read_endpoint() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tags/135/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let err = assert_err!(query.current_value("Clinker_Production").await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_batch_sends_only_resolved_ids() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/snapshot"))
            .and(query_param("ids", "135"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tagId": 135, "value": 77.0}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let names = vec!["OEE".to_string(), "Clinker_Production".to_string()];
        let batch = assert_ok!(query.current_values(&names).await);

        assert_eq!(batch.samples.len(), 1);
        assert_eq!(batch.samples[0].tag_name, "OEE");
        assert_eq!(batch.unresolved, vec!["Clinker_Production".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_maps_rows_back_and_skips_missing() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/snapshot"))
            .and(query_param("ids", "140,135"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"tagId": 140, "value": 1450.0},
                {"tagId": 999, "value": 0.0},
                {"value": 3.0}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let names = vec!["Kiln_Temp".to_string(), "OEE".to_string()];
        let batch = assert_ok!(query.current_values(&names).await);

        assert_eq!(batch.samples.len(), 1);
        assert_eq!(batch.samples[0].tag_name, "Kiln_Temp");
        assert!(batch.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_batch_without_resolvable_names_skips_upstream() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/snapshot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let batch = assert_ok!(query.current_values(&["Ghost".to_string()]).await);
        assert!(batch.samples.is_empty());
        assert_eq!(batch.unresolved, vec!["Ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_history_normalises_single_object() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        let (start, end) = range();
        Mock::given(method("GET"))
            .and(path("/api/v1/tags/135/history"))
            .and(query_param("start", "2024-05-01T00:00:00.000Z"))
            .and(query_param("end", "2024-05-01T01:00:00.000Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 5})))
            .mount(&server)
            .await;

        let first = assert_ok!(query.history("OEE", start, end).await);
        let second = assert_ok!(query.history("OEE", start, end).await);
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_aggregate_defaults_to_average() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        let (start, end) = range();
        Mock::given(method("GET"))
            .and(path("/api/v1/tags/135/aggregate"))
            .and(query_param("type", "average"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"value": 80.1}])))
            .expect(3)
            .mount(&server)
            .await;

        let implicit = assert_ok!(query.aggregate("OEE", start, end, None).await);
        let blank = assert_ok!(query.aggregate("OEE", start, end, Some("  ")).await);
        let explicit = assert_ok!(query.aggregate("OEE", start, end, Some("average")).await);
        assert_eq!(implicit, explicit);
        assert_eq!(blank, explicit);
        assert_eq!(implicit.kind, "average");
    }

    #[tokio::test]
    async fn test_interpolated_defaults_to_sixty_seconds() {
        let server = MockServer::start().await;
        let query = query_for(&server).await;
        let (start, end) = range();
        Mock::given(method("GET"))
            .and(path("/api/v1/tags/140/interpolated"))
            .and(query_param("interval", "60"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"value": 1.0, "time": "2024-05-01T00:00:00Z"},
                {"value": 2.0, "time": "2024-05-01T00:01:00Z"}
            ])))
            .expect(3)
            .mount(&server)
            .await;

        let implicit = assert_ok!(query.interpolated("Kiln_Temp", start, end, None).await);
        let zero = assert_ok!(query.interpolated("Kiln_Temp", start, end, Some(0)).await);
        let explicit = assert_ok!(query.interpolated("Kiln_Temp", start, end, Some(60)).await);
        assert_eq!(implicit, explicit);
        assert_eq!(zero, explicit);
        assert_eq!(implicit.len(), 2);
        assert!(implicit.iter().all(|s| s.tag_id == 140));
    }
}
