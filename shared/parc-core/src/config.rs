//! Configuration management for bridge services

use crate::error::{ParcError, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Deployment environment. Production hides internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ParcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ParcError::Config(format!("Unknown environment: {}", other))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_bind: String,
    pub environment: Environment,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // HTTP_BIND wins over the bare PORT convention
        let http_bind = match (lookup("HTTP_BIND"), lookup("PORT")) {
            (Some(bind), _) => bind,
            (None, Some(port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|e| ParcError::Config(format!("Invalid PORT: {}", e)))?;
                format!("0.0.0.0:{}", port)
            }
            (None, None) => "0.0.0.0:5000".to_string(),
        };

        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        Ok(Self {
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "historian-bridge".to_string()),
            http_bind,
            environment,
        })
    }
}
