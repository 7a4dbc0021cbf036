//! Shared application state

use parc_core::{DependencyStatus, Environment, ReadinessStatus};
use parc_historian_sdk::HistorianQuery;
use secrecy::SecretString;
use serde_json::json;
use std::time::Instant;

use crate::config::DashboardWindow;

#[derive(Clone)]
pub struct AppState {
    pub query: HistorianQuery,
    pub dashboard: DashboardWindow,
    pub environment: Environment,
    pub api_key: Option<SecretString>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        query: HistorianQuery,
        dashboard: DashboardWindow,
        environment: Environment,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            query,
            dashboard,
            environment,
            api_key,
            started: Instant::now(),
        }
    }

    /// Cache and upstream state, without touching the historian.
    ///
    /// Both caches fill and refresh on demand, so their state is reported
    /// rather than gating readiness.
    pub async fn readiness(&self) -> ReadinessStatus {
        let client = self.query.client();
        let credential = client.credentials().status();
        let directory = self.query.directory().peek().await;
        let latency = client.metrics().latency_ms.snapshot();

        let dependencies = vec![
            DependencyStatus {
                name: "historian-credential".to_string(),
                available: true,
                detail: Some(json!({
                    "cached": credential.is_some(),
                    "credential": credential,
                    "logins": client.credentials().login_count(),
                })),
            },
            DependencyStatus {
                name: "tag-directory".to_string(),
                available: true,
                detail: Some(json!({
                    "loaded": directory.is_some(),
                    "generation": directory.as_ref().map(|d| d.generation()),
                    "tags": directory.as_ref().map(|d| d.len()).unwrap_or(0),
                    "loadedAt": directory.as_ref().map(|d| d.loaded_at()),
                })),
            },
            DependencyStatus {
                name: "historian".to_string(),
                available: true,
                detail: Some(json!({
                    "requests": client.metrics().requests.get(),
                    "failures": client.metrics().failures.get(),
                    "latencyMs": latency,
                })),
            },
        ];

        ReadinessStatus {
            ready: dependencies.iter().all(|d| d.available),
            dependencies,
        }
    }
}
