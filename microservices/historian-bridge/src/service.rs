//! Historian Bridge service lifecycle

use axum::Router;
use parc_core::{ParcError, ParcService, Result};
use parc_historian_sdk::{HistorianClient, HistorianQuery, TagDirectory};
use std::sync::Arc;
use tracing::info;

use crate::api;
use crate::config::BridgeConfig;
use crate::state::AppState;

pub struct HistorianBridgeService {
    config: BridgeConfig,
    state: AppState,
}

impl HistorianBridgeService {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let client = HistorianClient::new(&config.historian)
            .map_err(|e| ParcError::Config(e.to_string()))?;
        let client = Arc::new(client);
        let directory = Arc::new(TagDirectory::new(client.clone()));
        let query = HistorianQuery::new(client, directory);

        let state = AppState::new(
            query,
            config.dashboard,
            config.service.environment,
            config.api_key.clone(),
        );

        Ok(Self { config, state })
    }

    pub fn router(&self) -> Router {
        api::create_router(self.state.clone(), &self.config.frontend_url)
    }
}

#[async_trait::async_trait]
impl ParcService for HistorianBridgeService {
    fn service_id(&self) -> &'static str {
        "historian-bridge"
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down Historian Bridge");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        info!(
            http = %self.config.service.http_bind,
            historian = %self.config.historian.base_url,
            api_key = self.config.api_key.is_some(),
            "Starting Historian Bridge server"
        );

        let listener = tokio::net::TcpListener::bind(&self.config.service.http_bind).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
