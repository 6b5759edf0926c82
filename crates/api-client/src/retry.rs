use crate::error::ApiError;
use configuration::RetrySettings;
use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `max_retries + 1` attempts in total.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff.max(settings.initial_backoff),
        }
    }
}

impl RetryPolicy {
    /// `initial * 2^retry`, capped at `max_backoff`. `retry` counts from 0.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// The wait before retry number `retry`. A provider's `Retry-After` is
    /// honoured when it asks for longer, up to `max_backoff`.
    pub fn delay_for(&self, retry: u32, error: &ApiError) -> Duration {
        let backoff = self.backoff(retry);
        match error.retry_after() {
            Some(asked) => asked.min(self.max_backoff).max(backoff),
            None => backoff,
        }
    }
}
