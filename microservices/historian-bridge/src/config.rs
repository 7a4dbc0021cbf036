//! Historian Bridge configuration

use parc_core::{ParcError, Result, ServiceConfig};
use parc_historian_sdk::HistorianConfig;
use secrecy::SecretString;
use std::time::Duration;

/// Trailing window read for each dashboard tag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardWindow {
    pub lookback: Duration,
    pub interval_secs: u32,
}

impl Default for DashboardWindow {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(3600),
            interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub service: ServiceConfig,
    pub historian: HistorianConfig,
    /// Only origin allowed by CORS
    pub frontend_url: String,
    /// When set, `/api/*` requires a matching `x-api-key` header
    pub api_key: Option<SecretString>,
    pub dashboard: DashboardWindow,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service = ServiceConfig::from_lookup(&lookup)?;
        let historian =
            HistorianConfig::from_lookup(&lookup).map_err(|e| ParcError::Config(e.to_string()))?;

        let mut dashboard = DashboardWindow::default();
        if let Some(raw) = lookup("DASHBOARD_LOOKBACK_SECS") {
            dashboard.lookback = Duration::from_secs(positive("DASHBOARD_LOOKBACK_SECS", &raw)?);
        }
        if let Some(raw) = lookup("DASHBOARD_INTERVAL_SECS") {
            let secs = positive("DASHBOARD_INTERVAL_SECS", &raw)?;
            dashboard.interval_secs = u32::try_from(secs).map_err(|_| {
                ParcError::Config(format!("DASHBOARD_INTERVAL_SECS out of range: {}", secs))
            })?;
        }

        Ok(Self {
            service,
            historian,
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            api_key: lookup("BACKEND_API_KEY")
                .filter(|key| !key.is_empty())
                .map(|key| SecretString::new(key.into())),
            dashboard,
        })
    }
}

fn positive(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ParcError::Config(format!("{} must be positive", key))),
        Ok(value) => Ok(value),
        Err(e) => Err(ParcError::Config(format!("Invalid {}: {}", key, e))),
    }
}
