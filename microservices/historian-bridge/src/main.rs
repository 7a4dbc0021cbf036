//! Historian Bridge entry point

use historian_bridge::{BridgeConfig, HistorianBridgeService};
use parc_core::{MicroserviceRuntime, ParcError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let service_name =
        std::env::var("SERVICE_NAME").unwrap_or_else(|_| "historian-bridge".to_string());
    parc_telemetry::init(&service_name).map_err(|e| ParcError::Telemetry(e.to_string()))?;

    if let Err(e) = dotenv {
        if !matches!(e, dotenvy::Error::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound) {
            warn!(error = %e, "Failed to read .env file");
        }
    }

    let config = BridgeConfig::from_env().map_err(|e| {
        error!(code = e.error_code(), "Invalid configuration: {}", e);
        e
    })?;

    info!(
        environment = %config.service.environment,
        "Starting Historian Bridge"
    );

    let service = Arc::new(HistorianBridgeService::new(config.clone())?);
    MicroserviceRuntime::new(config.service).run(service).await
}
