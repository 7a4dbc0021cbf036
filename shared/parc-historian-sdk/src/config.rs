//! Historian connection settings

use secrecy::SecretString;
use std::time::Duration;

use crate::{HistorianError, Result};

#[derive(Debug, Clone)]
pub struct HistorianConfig {
    /// Base URL without trailing slash, e.g. `https://historian.plant.local`
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
    /// Ceiling for every upstream call, login included
    pub timeout: Duration,
    /// Assumed token lifetime when the login response does not state one
    pub token_lifetime: Duration,
    /// Accept self-signed upstream certificates
    pub accept_invalid_certs: bool,
}

impl HistorianConfig {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            username: username.to_string(),
            password: SecretString::new(password.into()),
            timeout: Duration::from_secs(15),
            token_lifetime: Duration::from_secs(3600),
            accept_invalid_certs: false,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| HistorianError::Config(format!("{} is not set", key)))
        };

        let mut config = Self::new(
            &required("HISTORIAN_BASE_URL")?,
            &required("HISTORIAN_USERNAME")?,
            &required("HISTORIAN_PASSWORD")?,
        )?;

        if let Some(secs) = lookup("HISTORIAN_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_secs("HISTORIAN_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = lookup("HISTORIAN_TOKEN_LIFETIME_SECS") {
            config.token_lifetime =
                Duration::from_secs(parse_secs("HISTORIAN_TOKEN_LIFETIME_SECS", &secs)?);
        }
        config.accept_invalid_certs = lookup("HISTORIAN_ACCEPT_INVALID_CERTS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(config)
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(HistorianError::Config(format!("{} must be positive", key))),
        Ok(secs) => Ok(secs),
        Err(e) => Err(HistorianError::Config(format!("Invalid {}: {}", key, e))),
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| HistorianError::Config(format!("Invalid HISTORIAN_BASE_URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HistorianError::Config(format!(
            "HISTORIAN_BASE_URL must be http(s), got {}",
            url.scheme()
        )));
    }
    Ok(trimmed.to_string())
}
