//! Error types for Parc services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParcError>;

#[derive(Error, Debug)]
pub enum ParcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParcError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Telemetry(_) => "TELEMETRY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for ParcError {
    fn from(err: std::io::Error) -> Self {
        ParcError::Network(err.to_string())
    }
}
