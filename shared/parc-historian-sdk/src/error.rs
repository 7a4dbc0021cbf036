//! Error types for the historian SDK

/// Result type alias
pub type Result<T> = std::result::Result<T, HistorianError>;

/// Historian client errors
#[derive(Debug, thiserror::Error)]
pub enum HistorianError {
    #[error("Tag \"{0}\" not found in historian")]
    TagNotFound(String),

    #[error("Historian authentication failed: {0}")]
    Auth(String),

    #[error("Historian API error [{status}]: {message}")]
    Upstream { status: u16, message: String },

    #[error("Historian request timed out: {0}")]
    Timeout(String),

    #[error("Historian unreachable: {0}")]
    Transport(String),

    #[error("Unexpected historian response: {0}")]
    Decode(String),

    #[error("Historian returned no data for \"{0}\"")]
    Empty(String),

    #[error("Historian configuration error: {0}")]
    Config(String),
}

impl HistorianError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TagNotFound(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<reqwest::Error> for HistorianError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HistorianError::Timeout(err.to_string())
        } else if err.is_decode() {
            HistorianError::Decode(err.to_string())
        } else {
            HistorianError::Transport(err.to_string())
        }
    }
}
