//! Configuration module for monitored events and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `EventConfig`, `MonitoringConfig`,
//!   `ApiConfig`, `EmailConfig`)
//! - YAML loading functionality (`load_config`)
//! - Logging initialization (`logging::init_logging`)
//! - Application constants with environment variable overrides

pub mod constants;
mod loader;
pub mod logging;
mod types;

// Re-export types
pub use types::{ApiConfig, AppConfig, EmailConfig, EventConfig, MonitoringConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
