//! Application-wide constants and configuration defaults
//!
//! This module centralizes all hardcoded values to make them configurable
//! and maintainable. Values can be overridden via environment variables.

use std::time::Duration;

// =============================================================================
// Fetch Retry Configuration
// =============================================================================

/// Maximum fetch attempts per event per cycle, including the first
/// (default: 4)
///
/// Environment variable: `MAX_FETCH_ATTEMPTS`
pub fn max_fetch_attempts() -> u32 {
    std::env::var("MAX_FETCH_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4)
}

/// Base backoff delay before the first retry (default: 1000ms)
///
/// Environment variable: `RETRY_BASE_MS`
pub fn retry_base_delay() -> Duration {
    let ms = std::env::var("RETRY_BASE_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    Duration::from_millis(ms)
}

/// Backoff delay ceiling (default: 60 seconds)
///
/// Environment variable: `RETRY_CAP_SECS`
pub fn retry_cap() -> Duration {
    let secs = std::env::var("RETRY_CAP_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);
    Duration::from_secs(secs)
}

// =============================================================================
// Alert Delivery
// =============================================================================

/// Delivery attempts per alert email (default: 2)
///
/// Environment variable: `ALERT_DELIVERY_ATTEMPTS`
pub fn alert_delivery_attempts() -> u32 {
    std::env::var("ALERT_DELIVERY_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2)
}

// =============================================================================
// Scheduler
// =============================================================================

/// Scheduler wakeup interval (default: 60 seconds)
///
/// Environment variable: `SCHEDULER_TICK_SECS`
pub fn scheduler_tick() -> Duration {
    let secs = std::env::var("SCHEDULER_TICK_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);
    Duration::from_secs(secs)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for debugging/startup logs)
pub fn log_configuration() {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Fetch retry:");
    tracing::info!("  - Max fetch attempts: {}", max_fetch_attempts());
    tracing::info!("  - Base delay: {:?}", retry_base_delay());
    tracing::info!("  - Delay cap: {:?}", retry_cap());

    tracing::info!("Alert delivery:");
    tracing::info!("  - Delivery attempts: {}", alert_delivery_attempts());

    tracing::info!("Scheduler:");
    tracing::info!("  - Tick interval: {:?}", scheduler_tick());
    tracing::info!("==================================");
}
