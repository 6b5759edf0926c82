use crate::error::ApiError;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// A fully read response: status, headers and body text.
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// The shared HTTP client every provider is built on.
pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::Rejected(format!("Failed to build HTTP client: {e}")))
}

pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<RawResponse, ApiError> {
    let response = request.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await?;
    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

/// Seconds form of `Retry-After`. The HTTP-date form is not used by any of
/// the providers and is ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Maps a non-success status onto the error taxonomy.
pub(crate) fn status_error(coin: &str, response: &RawResponse) -> ApiError {
    let status = response.status;
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::IM_A_TEAPOT => ApiError::RateLimited {
            retry_after: retry_after(&response.headers),
        },
        StatusCode::NOT_FOUND => ApiError::NotFound(coin.to_string()),
        StatusCode::REQUEST_TIMEOUT => ApiError::Transient(format!("HTTP {status}")),
        s if s.is_server_error() => ApiError::Transient(format!("HTTP {status}")),
        _ => ApiError::Rejected(format!("HTTP {status}: {}", snippet(&response.body))),
    }
}

/// First part of a body, for error messages.
pub(crate) fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}

pub(crate) fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, ApiError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| ApiError::InvalidData(format!("Invalid timestamp: {ms}")))
}

/// `[now - days, now]` in epoch milliseconds.
pub(crate) fn lookback_millis(days: u32) -> (i64, i64) {
    let end = Utc::now();
    let start = end - chrono::Duration::days(i64::from(days));
    (start.timestamp_millis(), end.timestamp_millis())
}
