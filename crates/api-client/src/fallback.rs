use crate::PriceProvider;
use crate::error::ApiError;
use async_trait::async_trait;
use core_types::{CoinId, PriceSeries};
use std::sync::Arc;
use std::time::Duration;

/// Tries each source in order until one returns data.
///
/// Failures are merged so that the caller sees the most useful one:
/// `NotFound` only if every source said so, otherwise a retryable failure
/// (throttling before transient) so the retry loop backs off, otherwise the
/// first hard failure.
///
/// With a source timeout set, a source that does not answer in time counts
/// as a transient failure and the next source is tried.
pub struct FallbackProvider {
    sources: Vec<Arc<dyn PriceProvider>>,
    source_timeout: Option<Duration>,
}

impl FallbackProvider {
    pub fn new(sources: Vec<Arc<dyn PriceProvider>>) -> Self {
        Self {
            sources,
            source_timeout: None,
        }
    }

    pub fn with_source_timeout(mut self, limit: Duration) -> Self {
        self.source_timeout = Some(limit);
        self
    }

    async fn ask(&self, source: &dyn PriceProvider, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let Some(limit) = self.source_timeout else {
            return source.fetch_daily_closes(coin, days).await;
        };
        match tokio::time::timeout(limit, source.fetch_daily_closes(coin, days)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transient(format!(
                "{} gave no answer within {}ms",
                source.name(),
                limit.as_millis()
            ))),
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl PriceProvider for FallbackProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn fetch_daily_closes(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for (position, source) in self.sources.iter().enumerate() {
            match self.ask(source.as_ref(), coin, days).await {
                Ok(series) => {
                    tracing::debug!(
                        coin = %coin,
                        source = source.name(),
                        points = series.len(),
                        "Fetched daily closes."
                    );
                    return Ok(series);
                }
                Err(e) => {
                    tracing::warn!(
                        coin = %coin,
                        source = source.name(),
                        step = position + 1,
                        of = self.sources.len(),
                        error = %e,
                        "Source failed, trying the next one."
                    );
                    failures.push(e);
                }
            }
        }

        Err(merge_failures(coin, failures))
    }
}

fn merge_failures(coin: &CoinId, failures: Vec<ApiError>) -> ApiError {
    if failures.iter().all(|e| matches!(e, ApiError::NotFound(_))) {
        return ApiError::NotFound(coin.to_string());
    }
    if let Some(limited) = failures.iter().find(|e| matches!(e, ApiError::RateLimited { .. })) {
        return limited.clone();
    }
    if let Some(transient) = failures.iter().find(|e| matches!(e, ApiError::Transient(_))) {
        return transient.clone();
    }
    failures
        .into_iter()
        .find(|e| !matches!(e, ApiError::NotFound(_)))
        .unwrap_or_else(|| ApiError::NotFound(coin.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        result: Result<PriceSeries, ApiError>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(result: Result<PriceSeries, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_daily_closes(&self, _: &CoinId, _: u32) -> Result<PriceSeries, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn coin() -> CoinId {
        CoinId::parse("bitcoin").unwrap()
    }

    fn not_found() -> ApiError {
        ApiError::NotFound("bitcoin".to_string())
    }

    async fn run(sources: Vec<Arc<Fixed>>) -> Result<PriceSeries, ApiError> {
        let sources = sources
            .into_iter()
            .map(|s| s as Arc<dyn PriceProvider>)
            .collect();
        FallbackProvider::new(sources).fetch_daily_closes(&coin(), 30).await
    }

    #[tokio::test]
    async fn first_success_wins_and_later_sources_are_skipped() {
        let first = Fixed::new(Err(not_found()));
        let second = Fixed::new(Ok(PriceSeries::default()));
        let third = Fixed::new(Err(ApiError::Transient("down".into())));

        let result = run(vec![first.clone(), second.clone(), third.clone()]).await;
        assert_eq!(result, Ok(PriceSeries::default()));
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn not_found_everywhere_is_not_found() {
        let result = run(vec![Fixed::new(Err(not_found())), Fixed::new(Err(not_found()))]).await;
        assert_eq!(result, Err(not_found()));
    }

    #[tokio::test]
    async fn throttling_is_preferred_over_transient_and_hard_failures() {
        let limited = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        let result = run(vec![
            Fixed::new(Err(ApiError::Transient("502".into()))),
            Fixed::new(Err(not_found())),
            Fixed::new(Err(limited.clone())),
        ])
        .await;
        assert_eq!(result, Err(limited));
    }

    /// Never answers.
    struct Hung;

    #[async_trait]
    impl PriceProvider for Hung {
        fn name(&self) -> &'static str {
            "hung"
        }

        async fn fetch_daily_closes(&self, _: &CoinId, _: u32) -> Result<PriceSeries, ApiError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ApiError::Transient("woke up".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_source_is_abandoned_for_the_next_one() {
        let healthy = Fixed::new(Ok(PriceSeries::default()));
        let sources: Vec<Arc<dyn PriceProvider>> = vec![Arc::new(Hung), healthy.clone()];
        let provider = FallbackProvider::new(sources).with_source_timeout(Duration::from_secs(20));

        let start = tokio::time::Instant::now();
        let result = provider.fetch_daily_closes(&coin(), 30).await;
        assert_eq!(result, Ok(PriceSeries::default()));
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn every_source_hung_is_transient() {
        let sources: Vec<Arc<dyn PriceProvider>> = vec![Arc::new(Hung), Arc::new(Hung)];
        let provider = FallbackProvider::new(sources).with_source_timeout(Duration::from_secs(5));

        let result = provider.fetch_daily_closes(&coin(), 30).await;
        assert!(matches!(result, Err(ApiError::Transient(_))));
    }

    #[tokio::test]
    async fn hard_failure_surfaces_when_nothing_is_retryable() {
        let rejected = ApiError::Rejected("HTTP 403".into());
        let result = run(vec![Fixed::new(Err(not_found())), Fixed::new(Err(rejected.clone()))]).await;
        assert_eq!(result, Err(rejected));
    }
}
