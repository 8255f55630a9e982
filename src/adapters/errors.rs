//! Exchange adapter error types
//!
//! All exchange-related errors are wrapped in ExchangeError enum
//! which implements thiserror for consistent error handling.

use thiserror::Error;

/// Exchange-specific error types for adapter operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Request could not reach the exchange
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Exchange refused the order
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Exchange answered with an application-level error code
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let err = ExchangeError::ConnectionFailed("timeout".to_string());
        assert_eq!(err.to_string(), "Connection failed: timeout");
    }

    #[test]
    fn test_network_timeout_display() {
        let err = ExchangeError::NetworkTimeout(5000);
        assert_eq!(err.to_string(), "Network timeout after 5000ms");
    }

    #[test]
    fn test_order_rejected_display() {
        let err = ExchangeError::OrderRejected("insufficient balance".to_string());
        assert_eq!(err.to_string(), "Order rejected: insufficient balance");
    }

    #[test]
    fn test_api_error_display() {
        let err = ExchangeError::Api {
            code: "51008".to_string(),
            message: "Order failed".to_string(),
        };
        assert_eq!(err.to_string(), "API error 51008: Order failed");
    }
}
