//! Historian REST client
//!
//! One pinned endpoint per read shape. Every call carries the cached bearer
//! token; a 401 invalidates it so the next call logs in again.

use chrono::{DateTime, SecondsFormat, Utc};
use parc_telemetry::{Counter, Histogram};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::credentials::CredentialCache;
use crate::types::{OneOrMany, TagDescriptor, TagId, UpstreamRecord};
use crate::{Clock, HistorianConfig, HistorianError, Result, SystemClock};

const LOGIN_PATH: &str = "/api/v1/auth/login";
const TAGS_PATH: &str = "/api/v1/tags";
const SNAPSHOT_PATH: &str = "/api/v1/snapshot";
const NO_QUERY: &[(&str, &str)] = &[];

/// Counters for calls made against the historian
#[derive(Debug, Clone)]
pub struct UpstreamMetrics {
    pub requests: Counter,
    pub failures: Counter,
    pub latency_ms: Histogram,
}

impl Default for UpstreamMetrics {
    fn default() -> Self {
        Self {
            requests: Counter::new("historian_requests"),
            failures: Counter::new("historian_failures"),
            latency_ms: Histogram::new("historian_latency_ms"),
        }
    }
}

pub struct HistorianClient {
    http: Client,
    base_url: String,
    credentials: Arc<CredentialCache>,
    metrics: UpstreamMetrics,
}

impl HistorianClient {
    pub fn new(config: &HistorianConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &HistorianConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| HistorianError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let credentials = Arc::new(CredentialCache::new(
            http.clone(),
            format!("{}{}", config.base_url, LOGIN_PATH),
            config.username.clone(),
            config.password.clone(),
            config.token_lifetime,
            clock,
        ));

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials,
            metrics: UpstreamMetrics::default(),
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    pub fn metrics(&self) -> &UpstreamMetrics {
        &self.metrics
    }

    /// Full tag listing
    pub async fn list_tags(&self) -> Result<Vec<TagDescriptor>> {
        self.get_json(TAGS_PATH, NO_QUERY).await
    }

    /// Latest value of one tag
    pub async fn current(&self, id: TagId) -> Result<OneOrMany<UpstreamRecord>> {
        self.get_json(&format!("{}/{}/current", TAGS_PATH, id), NO_QUERY)
            .await
    }

    /// Latest values of several tags in a single call
    pub async fn snapshot(&self, ids: &[TagId]) -> Result<OneOrMany<UpstreamRecord>> {
        let ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.get_json(SNAPSHOT_PATH, &[("ids", ids)]).await
    }

    pub async fn history(
        &self,
        id: TagId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<OneOrMany<UpstreamRecord>> {
        self.get_json(
            &format!("{}/{}/history", TAGS_PATH, id),
            &[("start", iso(&start)), ("end", iso(&end))],
        )
        .await
    }

    pub async fn aggregate(
        &self,
        id: TagId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        kind: &str,
    ) -> Result<OneOrMany<Map<String, Value>>> {
        self.get_json(
            &format!("{}/{}/aggregate", TAGS_PATH, id),
            &[
                ("start", iso(&start)),
                ("end", iso(&end)),
                ("type", kind.to_string()),
            ],
        )
        .await
    }

    pub async fn interpolated(
        &self,
        id: TagId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval_secs: u32,
    ) -> Result<OneOrMany<UpstreamRecord>> {
        self.get_json(
            &format!("{}/{}/interpolated", TAGS_PATH, id),
            &[
                ("start", iso(&start)),
                ("end", iso(&end)),
                ("interval", interval_secs.to_string()),
            ],
        )
        .await
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let token = self.credentials.get_token().await?;
        let url = format!("{}{}", self.base_url, path);

        self.metrics.requests.inc();
        let started = Instant::now();
        let sent = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await;
        self.metrics
            .latency_ms
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.metrics.failures.inc();
                warn!(path, error = %e, "Historian request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.metrics.failures.inc();
            self.credentials.invalidate(&token);
            let message = upstream_message(response).await;
            warn!(status = status.as_u16(), path, %message, "Historian API error");
            return Err(HistorianError::Auth(message));
        }
        if !status.is_success() {
            self.metrics.failures.inc();
            let message = upstream_message(response).await;
            warn!(status = status.as_u16(), path, %message, "Historian API error");
            return Err(HistorianError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = status.as_u16(), path, "Historian call succeeded");
        response.json::<T>().await.map_err(|e| {
            self.metrics.failures.inc();
            HistorianError::Decode(format!("{}: {}", path, e))
        })
    }
}

/// Error text from a failed response: the JSON `message` field when present,
/// otherwise the raw body, otherwise the status reason.
pub(crate) async fn upstream_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let from_json = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));

    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}

fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HistorianClient {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"token": "tok", "expiresIn": 3600})),
            )
            .mount(server)
            .await;

        let config = HistorianConfig::new(&server.uri(), "bridge", "s3cret").unwrap();
        HistorianClient::new(&config).unwrap()
    }

    #[test]
    fn test_iso_matches_javascript_format() {
        let ts: DateTime<Utc> = "2024-05-01T10:00:00+02:00".parse().unwrap();
        assert_eq!(iso(&ts), "2024-05-01T08:00:00.000Z");
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/tags"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": 135, "name": "OEE"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tags = assert_ok!(client.list_tags().await);
        assert_eq!(tags[0].name, "OEE");
        assert_eq!(client.metrics().requests.get(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_joins_ids() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/snapshot"))
            .and(query_param("ids", "135,132"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let rows = assert_ok!(client.snapshot(&[135, 132]).await);
        assert!(rows.into_vec().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_credential() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/tags"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})),
            )
            .mount(&server)
            .await;

        let err = assert_err!(client.list_tags().await);
        assert!(err.is_auth());
        assert!(client.credentials().status().is_none());
        assert_eq!(client.metrics().failures.get(), 1);

        // the failing call is not retried; the next one logs in again
        assert_err!(client.list_tags().await);
        assert_eq!(client.credentials().login_count(), 2);
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_message() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/tags/7/current"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        match assert_err!(client.current(7).await) {
            HistorianError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // a plain upstream failure keeps the token
        assert!(client.credentials().status().is_some());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/tags"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut config = HistorianConfig::new(&server.uri(), "bridge", "s3cret").unwrap();
        config.timeout = std::time::Duration::from_millis(100);
        let client = HistorianClient::new(&config).unwrap();

        let err = assert_err!(client.list_tags().await);
        assert!(matches!(err, HistorianError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = assert_err!(client.list_tags().await);
        assert!(matches!(err, HistorianError::Decode(_)));
    }
}
