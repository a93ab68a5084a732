//! Errors raised while talking to Injective endpoints

use thiserror::Error;

use analytics_core::AnalyticsError;

#[derive(Error, Debug)]
pub enum InjectiveError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Injective API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl InjectiveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InjectiveError::NotFound(_))
    }
}

impl From<InjectiveError> for AnalyticsError {
    fn from(err: InjectiveError) -> Self {
        match err {
            InjectiveError::NotFound(msg) => AnalyticsError::NotFound(msg),
            other => AnalyticsError::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_analytics_error() {
        let not_found: AnalyticsError = InjectiveError::NotFound("0xabc".into()).into();
        assert_eq!(not_found, AnalyticsError::NotFound("0xabc".into()));

        let status: AnalyticsError = InjectiveError::Status {
            status: 503,
            body: "unavailable".into(),
        }
        .into();
        assert!(status.is_upstream_failure());

        let parse: AnalyticsError = InjectiveError::Parse("bad json".into()).into();
        assert!(matches!(parse, AnalyticsError::UpstreamUnavailable(_)));
    }
}
