use crate::error::ConfigError;
use core_types::CoinId;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub cache: CacheSettings,
    pub analytics: AnalyticsSettings,
    pub logging: LoggingSettings,
}

/// Where the HTTP API listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// The market-data sources that can serve daily closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ProviderSource {
    Binance,
    #[serde(alias = "coin_gecko")]
    #[cfg_attr(feature = "clap", value(name = "coingecko"))]
    CoinGecko,
    Bitget,
}

/// Contains parameters for talking to the upstream market-data providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Sources in fallback order; the first one that answers wins.
    pub sources: Vec<ProviderSource>,
    pub binance_url: String,
    pub coingecko_url: String,
    pub bitget_url: String,
    pub user_agent: String,
    /// Upper bound for a single upstream call, including the body download.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Upstream calls allowed in flight at once, across all requests.
    pub max_concurrent_requests: usize,
    /// Sustained call budget of the token bucket.
    pub requests_per_minute: u32,
    /// Calls that may be issued back-to-back before the bucket throttles.
    pub burst: u32,
    pub retry: RetrySettings,
}

/// Exponential backoff applied to rate-limited and transient failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

/// Contains parameters for the result cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a computed matrix/series/beta result is served from memory.
    #[serde(with = "humantime_serde")]
    pub result_ttl: Duration,
    /// Capacity bound; the oldest results are evicted first.
    pub max_entries: usize,
    /// Width of the as-of bucket that is part of every cache key.
    #[serde(with = "humantime_serde")]
    pub time_bucket: Duration,
    #[serde(with = "humantime_serde")]
    pub coin_list_ttl: Duration,
}

/// Request limits and defaults for the analytics endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// The reference coin betas are computed against.
    pub benchmark: String,
    pub allowed_days: Vec<u32>,
    pub max_coins: usize,
    pub default_days: u32,
    pub default_window: usize,
    pub default_coins: Vec<String>,
    pub default_beta_coins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is not set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

// --- Default Implementations ---
// These allow a user to omit any section (or the whole file) and still
// get a working service.

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            sources: vec![
                ProviderSource::Binance,
                ProviderSource::CoinGecko,
                ProviderSource::Bitget,
            ],
            binance_url: "https://api.binance.com".to_string(),
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            bitget_url: "https://api.bitget.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            request_timeout: Duration::from_secs(20),
            max_concurrent_requests: 4,
            requests_per_minute: 60,
            burst: 10,
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            result_ttl: Duration::from_secs(10 * 60),
            max_entries: 256,
            time_bucket: Duration::from_secs(24 * 60 * 60),
            coin_list_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            benchmark: "bitcoin".to_string(),
            allowed_days: vec![7, 30, 90],
            max_coins: 20,
            default_days: 30,
            default_window: 7,
            default_coins: vec![
                "bitcoin".to_string(),
                "ethereum".to_string(),
                "solana".to_string(),
            ],
            default_beta_coins: vec!["ethereum".to_string(), "solana".to_string()],
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "correlation-service".to_string(),
        }
    }
}

impl Settings {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = &self.provider;
        if provider.sources.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.sources must list at least one source".to_string(),
            ));
        }
        if provider.max_concurrent_requests == 0 {
            return Err(ConfigError::ValidationError(
                "provider.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if provider.requests_per_minute == 0 || provider.burst == 0 {
            return Err(ConfigError::ValidationError(
                "provider.requests_per_minute and provider.burst must be at least 1".to_string(),
            ));
        }
        if self.cache.time_bucket.is_zero() {
            return Err(ConfigError::ValidationError(
                "cache.time_bucket must be longer than zero".to_string(),
            ));
        }

        let analytics = &self.analytics;
        CoinId::parse(&analytics.benchmark).map_err(|e| {
            ConfigError::ValidationError(format!("analytics.benchmark: {e}"))
        })?;
        if analytics.allowed_days.is_empty() || analytics.allowed_days.contains(&0) {
            return Err(ConfigError::ValidationError(
                "analytics.allowed_days must contain positive day counts".to_string(),
            ));
        }
        if !analytics.allowed_days.contains(&analytics.default_days) {
            return Err(ConfigError::ValidationError(format!(
                "analytics.default_days ({}) is not one of analytics.allowed_days",
                analytics.default_days
            )));
        }
        if analytics.max_coins == 0 {
            return Err(ConfigError::ValidationError(
                "analytics.max_coins must be at least 1".to_string(),
            ));
        }
        if analytics.default_window < 2 {
            return Err(ConfigError::ValidationError(
                "analytics.default_window must be at least 2".to_string(),
            ));
        }

        Ok(())
    }
}
