//! Application-wide constants and timing defaults
//!
//! This module centralizes the timing values that are not part of the YAML
//! file. Values can be overridden via environment variables.

use std::time::Duration;

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Scheduling Loops
// =============================================================================

/// Delay before a loop retries after a failed cycle (default: 5 seconds)
///
/// Environment variable: `ERROR_BACKOFF_SECS`
pub fn error_backoff() -> Duration {
    Duration::from_secs(env_or("ERROR_BACKOFF_SECS", 5))
}

/// Poll interval of a loop whose feature flag is off (default: 5 seconds)
///
/// Environment variable: `IDLE_POLL_SECS`
pub fn idle_poll_interval() -> Duration {
    Duration::from_secs(env_or("IDLE_POLL_SECS", 5))
}

/// Balance refresh interval (default: 30 seconds)
///
/// Environment variable: `BALANCE_REFRESH_INTERVAL_SECS`
pub fn balance_refresh_interval() -> Duration {
    Duration::from_secs(env_or("BALANCE_REFRESH_INTERVAL_SECS", 30))
}

/// Auto-trade monitor tick (default: 10 seconds)
///
/// Environment variable: `AUTO_TRADE_INTERVAL_SECS`
pub fn auto_trade_interval() -> Duration {
    Duration::from_secs(env_or("AUTO_TRADE_INTERVAL_SECS", 10))
}

// =============================================================================
// Execution
// =============================================================================

/// Upper bound on a single order placement in milliseconds (default: 10000ms)
///
/// Environment variable: `ORDER_TIMEOUT_MS`
pub fn order_timeout_ms() -> u64 {
    env_or("ORDER_TIMEOUT_MS", 10_000)
}

/// How long shutdown waits for in-flight trades (default: 30 seconds)
///
/// Environment variable: `SHUTDOWN_GRACE_SECS`
pub fn shutdown_grace_period() -> Duration {
    Duration::from_secs(env_or("SHUTDOWN_GRACE_SECS", 30))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for startup logs)
pub fn log_configuration() {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Loops:");
    tracing::info!("  - Error backoff: {:?}", error_backoff());
    tracing::info!("  - Idle poll interval: {:?}", idle_poll_interval());
    tracing::info!("  - Balance refresh interval: {:?}", balance_refresh_interval());
    tracing::info!("  - Auto-trade interval: {:?}", auto_trade_interval());

    tracing::info!("Execution:");
    tracing::info!("  - Order timeout: {}ms", order_timeout_ms());
    tracing::info!("  - Shutdown grace period: {:?}", shutdown_grace_period());
    tracing::info!("==================================");
}
