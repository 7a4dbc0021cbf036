//! Historian Bridge
//!
//! Name-addressed REST façade over a process historian that only speaks
//! numeric tag IDs:
//! - Single-tag reads (current, history, aggregate, interpolated)
//! - Batched current values in one upstream call
//! - Multi-tag query and dashboard fan-out with per-tag failure slots
//! - Optional API key, CORS and security headers

pub mod api;
pub mod config;
pub mod error;
pub mod fanout;
pub mod service;
pub mod state;


pub use config::{BridgeConfig, DashboardWindow};
pub use error::ApiError;
pub use service::HistorianBridgeService;
pub use state::AppState;
