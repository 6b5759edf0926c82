use std::time::Duration;
use thiserror::Error;

/// Failures talking to a market-data provider.
///
/// `Clone` so that one shared in-flight fetch can hand the same failure to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("No data for '{0}' at the provider")]
    NotFound(String),

    #[error("Rate limited by the provider{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transient upstream failure: {0}")]
    Transient(String),

    #[error("The provider rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl ApiError {
    /// Only throttling and transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Deserialization(e.to_string())
        } else {
            // Connect, timeout and body errors are all worth retrying.
            ApiError::Transient(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttling_and_transient_are_retryable() {
        assert!(ApiError::RateLimited { retry_after: None }.is_retryable());
        assert!(ApiError::Transient("503".into()).is_retryable());
        assert!(!ApiError::NotFound("x".into()).is_retryable());
        assert!(!ApiError::Rejected("400".into()).is_retryable());
        assert!(!ApiError::UpstreamUnavailable("gone".into()).is_retryable());
    }

    #[test]
    fn rate_limited_message_mentions_delay() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(err.to_string(), "Rate limited by the provider (retry after 3s)");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }
}
