//! Historian SDK for the Parc bridge
//!
//! Talks to a remote historian that addresses data by numeric tag IDs:
//! - [`CredentialCache`] logs in once and reuses the bearer token until shortly
//!   before it expires
//! - [`TagDirectory`] loads the tag listing once and resolves names to IDs
//! - [`HistorianQuery`] issues the reads and returns name-keyed shapes

mod client;
mod clock;
mod config;
mod credentials;
mod directory;
mod error;
mod query;
mod types;

pub use client::{HistorianClient, UpstreamMetrics};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::HistorianConfig;
pub use credentials::{Credential, CredentialCache, CredentialStatus, EXPIRY_SAFETY_FACTOR};
pub use directory::{DirectorySnapshot, Resolution, TagDirectory};
pub use error::{HistorianError, Result};
pub use query::{HistorianQuery, DEFAULT_AGGREGATE, DEFAULT_INTERVAL_SECS};
pub use types::*;

/// Re-export for convenience
pub mod prelude {
    pub use super::types::*;
    pub use super::{HistorianClient, HistorianError, HistorianQuery, Result, TagDirectory};
}
