//! Error types for the analytics service

use std::time::Duration;
use thiserror::Error;

/// Service-wide error type
///
/// Cloneable so a single failed upstream fetch can be delivered to every
/// request that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyticsError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        AnalyticsError::UpstreamUnavailable(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AnalyticsError::NotFound(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        AnalyticsError::InsufficientData(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AnalyticsError::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AnalyticsError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AnalyticsError::Internal(msg.into())
    }

    /// Whether the failure originated at the raw data source
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            AnalyticsError::UpstreamUnavailable(_) | AnalyticsError::UpstreamTimeout(_)
        )
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::UpstreamUnavailable(_) => "upstream_unavailable",
            AnalyticsError::UpstreamTimeout(_) => "upstream_timeout",
            AnalyticsError::NotFound(_) => "not_found",
            AnalyticsError::InsufficientData(_) => "insufficient_data",
            AnalyticsError::RateLimited { .. } => "rate_limited",
            AnalyticsError::InvalidInput(_) => "invalid_input",
            AnalyticsError::Config(_) => "config",
            AnalyticsError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(AnalyticsError::upstream("down").is_upstream_failure());
        assert!(AnalyticsError::UpstreamTimeout(Duration::from_secs(1)).is_upstream_failure());
        assert!(!AnalyticsError::not_found("x").is_upstream_failure());
        assert!(!AnalyticsError::insufficient_data("x").is_upstream_failure());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(AnalyticsError::not_found("m").kind(), "not_found");
        assert_eq!(
            AnalyticsError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .kind(),
            "rate_limited"
        );
    }
}
