use crate::PriceProvider;
use crate::binance::BinanceProvider;
use crate::bitget::BitgetProvider;
use crate::coingecko::CoinGeckoProvider;
use crate::error::ApiError;
use crate::fallback::FallbackProvider;
use crate::http;
use crate::rate_limit::TokenBucket;
use crate::retry::RetryPolicy;
use cache::{Clock, ResultCache, SystemClock};
use configuration::{ProviderSettings, ProviderSource};
use core_types::{CoinId, PriceSeries};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Limits applied around every upstream call.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl From<&ProviderSettings> for ClientOptions {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            retry: RetryPolicy::from(&settings.retry),
            // One attempt walks the whole fallback chain, each source with its own limit.
            request_timeout: settings.request_timeout * settings.sources.len().max(1) as u32,
            max_concurrent_requests: settings.max_concurrent_requests,
            requests_per_minute: settings.requests_per_minute,
            burst: settings.burst,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&ProviderSettings::default())
    }
}

type FetchKey = (CoinId, u32);

/// The Price History Provider Client.
///
/// Wraps a [`PriceProvider`] with everything the upstream's rate limit calls
/// for: one in-flight fetch per `(coin, days)`, a global concurrency cap, a
/// token bucket, a per-attempt timeout and bounded retries. Cheap to clone;
/// clones share all of that state.
#[derive(Clone)]
pub struct MarketDataClient {
    inner: Arc<Inner>,
    in_flight: ResultCache<FetchKey, PriceSeries, ApiError>,
}

struct Inner {
    provider: Arc<dyn PriceProvider>,
    options: ClientOptions,
    permits: Semaphore,
    limiter: TokenBucket,
}

impl MarketDataClient {
    pub fn new(provider: Arc<dyn PriceProvider>, options: ClientOptions, clock: Arc<dyn Clock>) -> Self {
        let inner = Inner {
            provider,
            permits: Semaphore::new(options.max_concurrent_requests.max(1)),
            limiter: TokenBucket::new(options.requests_per_minute, options.burst),
            options,
        };
        Self {
            inner: Arc::new(inner),
            in_flight: ResultCache::single_flight(clock),
        }
    }

    /// Builds the HTTP providers in the configured fallback order.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ApiError> {
        let http = http::build_client(&settings.user_agent, settings.request_timeout)?;

        let sources: Vec<Arc<dyn PriceProvider>> = settings
            .sources
            .iter()
            .map(|source| -> Arc<dyn PriceProvider> {
                match source {
                    ProviderSource::Binance => {
                        Arc::new(BinanceProvider::new(http.clone(), &settings.binance_url))
                    }
                    ProviderSource::CoinGecko => {
                        Arc::new(CoinGeckoProvider::new(http.clone(), &settings.coingecko_url))
                    }
                    ProviderSource::Bitget => {
                        Arc::new(BitgetProvider::new(http.clone(), &settings.bitget_url))
                    }
                }
            })
            .collect();

        let fallback = FallbackProvider::new(sources).with_source_timeout(settings.request_timeout);
        tracing::info!(sources = ?fallback.source_names(), "Market data client configured.");

        Ok(Self::new(
            Arc::new(fallback),
            ClientOptions::from(settings),
            Arc::new(SystemClock),
        ))
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.provider.name()
    }

    /// Fetches the daily closes of `coin` over the last `days` days.
    ///
    /// Concurrent calls for the same `(coin, days)` share a single upstream
    /// fetch. Dropping every caller cancels it.
    pub async fn fetch_series(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let inner = Arc::clone(&self.inner);
        let key = (coin.clone(), days);
        let coin = coin.clone();
        self.in_flight
            .get_or_compute(key, move || async move { inner.fetch_with_retry(&coin, days).await })
            .await
    }
}

impl Inner {
    async fn fetch_with_retry(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let policy = self.options.retry;
        let mut retry = 0;

        loop {
            match self.attempt(coin, days).await {
                Ok(series) => return Ok(series),
                Err(e) if e.is_retryable() => {
                    if retry >= policy.max_retries {
                        tracing::error!(
                            coin = %coin,
                            attempts = retry + 1,
                            error = %e,
                            "Retry budget exhausted."
                        );
                        return Err(ApiError::UpstreamUnavailable(format!(
                            "{coin}: gave up after {} attempts, last error: {e}",
                            retry + 1
                        )));
                    }
                    let delay = policy.delay_for(retry, &e);
                    tracing::warn!(
                        coin = %coin,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream call failed, backing off."
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ApiError::Transient("request permits closed".to_string()))?;
        self.limiter.acquire().await;

        let timeout = self.options.request_timeout;
        match tokio::time::timeout(timeout, self.provider.fetch_daily_closes(coin, days)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transient(format!(
                "no answer within {}ms",
                timeout.as_millis()
            ))),
        }
    }
}
