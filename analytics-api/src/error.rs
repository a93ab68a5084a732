//! HTTP mapping of service errors

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use analytics_core::AnalyticsError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Handler error wrapping [`AnalyticsError`]
#[derive(Debug)]
pub struct ApiError(pub AnalyticsError);

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AnalyticsError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalyticsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AnalyticsError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AnalyticsError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AnalyticsError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AnalyticsError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AnalyticsError::Config(_) | AnalyticsError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            e if e.is_upstream_failure() => warn!("Upstream failure: {}", e),
            AnalyticsError::Config(_) | AnalyticsError::Internal(_) => error!("{}", self.0),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        let mut response = (status, Json(body)).into_response();

        if let AnalyticsError::RateLimited { retry_after } = &self.0 {
            // Whole seconds, rounded up so clients never retry early
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AnalyticsError::not_found("m"), StatusCode::NOT_FOUND),
            (AnalyticsError::invalid_input("depth"), StatusCode::BAD_REQUEST),
            (AnalyticsError::insufficient_data("book"), StatusCode::UNPROCESSABLE_ENTITY),
            (AnalyticsError::upstream("lcd"), StatusCode::BAD_GATEWAY),
            (
                AnalyticsError::UpstreamTimeout(Duration::from_secs(10)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (AnalyticsError::internal("oops"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError(AnalyticsError::RateLimited {
            retry_after: Duration::from_millis(2500),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let response = ApiError(AnalyticsError::RateLimited {
            retry_after: Duration::ZERO,
        })
        .into_response();

        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
