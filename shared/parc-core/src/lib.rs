//! Parc Core - Shared service infrastructure
//!
//! This crate provides:
//! - Standard service trait every bridge service implements
//! - Runtime bootstrap with graceful shutdown
//! - Error handling utilities
//! - Base configuration management

pub mod config;
pub mod error;
pub mod service;

pub use config::{Environment, ServiceConfig};
pub use error::{ParcError, Result};
pub use service::{DependencyStatus, HealthStatus, MicroserviceRuntime, ParcService, ReadinessStatus};
