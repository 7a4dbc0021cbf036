//! Service infrastructure shared by bridge services

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{ParcError, Result};

/// Liveness payload served on `/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the service started
    pub uptime: f64,
}

impl HealthStatus {
    pub fn since(started: Instant) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            uptime: started.elapsed().as_secs_f64(),
        }
    }
}

/// Readiness payload: one entry per upstream or cache the service leans on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub dependencies: Vec<DependencyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Standard trait all bridge services implement
#[async_trait]
pub trait ParcService: Send + Sync + 'static {
    /// Service identifier (e.g., "historian-bridge")
    fn service_id(&self) -> &'static str;

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Called once after a shutdown signal or after `start` returns
    async fn shutdown(&self) -> Result<()>;

    /// Start the service's servers
    async fn start(&self) -> Result<()>;
}

/// Standard runtime bootstrap
pub struct MicroserviceRuntime {
    config: ServiceConfig,
    start_time: Instant,
}

impl MicroserviceRuntime {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    /// Run a service with standard lifecycle management
    pub async fn run<S: ParcService>(self, service: Arc<S>) -> Result<()> {
        info!(
            service_id = service.service_id(),
            service_name = %self.config.service_name,
            version = service.version(),
            environment = %self.config.environment,
            "Starting service"
        );

        let service_clone = service.clone();
        let mut service_handle = tokio::spawn(async move { service_clone.start().await });

        let outcome = tokio::select! {
            _ = Self::wait_for_shutdown() => {
                info!("Shutdown signal received, gracefully stopping...");
                Ok(())
            }
            joined = &mut service_handle => match joined {
                Ok(Ok(())) => {
                    warn!("Service task exited before a shutdown signal");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(code = e.error_code(), "Service error: {}", e);
                    Err(e)
                }
                Err(e) => {
                    error!("Service task aborted: {}", e);
                    Err(ParcError::Internal(format!("service task aborted: {}", e)))
                }
            },
        };

        if let Err(e) = service.shutdown().await {
            warn!("Error during shutdown: {}", e);
        }

        service_handle.abort();

        info!(
            uptime_seconds = self.start_time.elapsed().as_secs(),
            "Service stopped"
        );

        outcome
    }

    async fn wait_for_shutdown() {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }
}
