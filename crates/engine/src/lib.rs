//! # Correlation Engine
//!
//! The orchestrator behind every analysis request: validate, look up the
//! result cache, fetch the price histories concurrently, run the calculators
//! and decide what a partial failure means for the response.

use crate::error::EngineError;
use crate::fetch::{fetch_all, in_request_order, nothing_usable, required_coin_missing};
use analytics::{AnalyticsError, Alignment};
use api_client::MarketDataClient;
use cache::{Clock, ResultCache, SystemClock};
use configuration::{AnalyticsSettings, CacheSettings, Settings};
use core_types::{CoinId, ReturnSeries, SkipReason, SkippedCoin};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub mod error;
mod fetch;
pub mod report;

pub use report::{BetaReport, MatrixReport, RollingReport};

/// Limits and cache policy for the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub benchmark: CoinId,
    pub allowed_days: Vec<u32>,
    pub max_coins: usize,
    pub result_ttl: Duration,
    pub max_entries: usize,
    /// Width of the as-of bucket folded into every cache key.
    pub time_bucket: Duration,
}

impl EngineOptions {
    pub fn from_settings(
        analytics: &AnalyticsSettings,
        cache: &CacheSettings,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            benchmark: CoinId::parse(&analytics.benchmark)
                .map_err(|e| EngineError::Configuration(e.to_string()))?,
            allowed_days: analytics.allowed_days.clone(),
            max_coins: analytics.max_coins,
            result_ttl: cache.result_ttl,
            max_entries: cache.max_entries,
            time_bucket: cache.time_bucket,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Matrix,
    Rolling,
    Beta,
}

/// Everything a cached result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub kind: AnalysisKind,
    pub coins: Vec<CoinId>,
    pub days: u32,
    pub window: Option<usize>,
    pub benchmark: Option<CoinId>,
    /// `now / time_bucket`: results never outlive the bucket they were computed in.
    pub bucket: i64,
}

/// The Correlation Analytics Engine.
///
/// Cheap to clone; clones share the provider client and the result caches.
#[derive(Clone)]
pub struct CorrelationEngine {
    client: MarketDataClient,
    options: Arc<EngineOptions>,
    clock: Arc<dyn Clock>,
    matrices: ResultCache<RequestKey, MatrixReport, EngineError>,
    rolling: ResultCache<RequestKey, RollingReport, EngineError>,
    betas: ResultCache<RequestKey, BetaReport, EngineError>,
}

impl CorrelationEngine {
    pub fn new(client: MarketDataClient, options: EngineOptions, clock: Arc<dyn Clock>) -> Self {
        let (ttl, max_entries) = (options.result_ttl, options.max_entries);
        Self {
            client,
            matrices: ResultCache::new(ttl, max_entries, Arc::clone(&clock)),
            rolling: ResultCache::new(ttl, max_entries, Arc::clone(&clock)),
            betas: ResultCache::new(ttl, max_entries, Arc::clone(&clock)),
            options: Arc::new(options),
            clock,
        }
    }

    /// Wires the HTTP providers and the wall clock from the loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        let client = MarketDataClient::from_settings(&settings.provider)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        let options = EngineOptions::from_settings(&settings.analytics, &settings.cache)?;
        Ok(Self::new(client, options, Arc::new(SystemClock)))
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // --- Public operations ---

    /// Correlation matrix of `coins` over the last `days` days.
    ///
    /// Unknown or unusable coins are listed in `skipped`; the request only
    /// fails when none of them can be used.
    pub async fn correlation_matrix(
        &self,
        coins: &[CoinId],
        days: u32,
    ) -> Result<MatrixReport, EngineError> {
        self.validate_days(days)?;
        self.validate_coins(coins)?;

        let key = self.key(AnalysisKind::Matrix, coins, days, None, None);
        let engine = self.clone();
        let coins = coins.to_vec();
        self.matrices
            .get_or_compute_if(
                key,
                move || async move { engine.compute_matrix(coins, days).await },
                |report: &MatrixReport| !report.has_upstream_gaps(),
            )
            .await
    }

    /// Rolling correlation of two coins. Both are required.
    pub async fn rolling_correlation(
        &self,
        coin_a: &CoinId,
        coin_b: &CoinId,
        days: u32,
        window: usize,
    ) -> Result<RollingReport, EngineError> {
        self.validate_days(days)?;
        if window < analytics::stats::MIN_OBSERVATIONS {
            return Err(EngineError::InvalidInput(format!(
                "window must be at least {}, got {window}",
                analytics::stats::MIN_OBSERVATIONS
            )));
        }

        let pair = [coin_a.clone(), coin_b.clone()];
        let key = self.key(AnalysisKind::Rolling, &pair, days, Some(window), None);
        let engine = self.clone();
        let [coin_a, coin_b] = pair;
        self.rolling
            .get_or_compute(key, move || async move {
                engine.compute_rolling(coin_a, coin_b, days, window).await
            })
            .await
    }

    /// Betas of `coins` against `benchmark` (the configured one if `None`).
    pub async fn beta(
        &self,
        coins: &[CoinId],
        days: u32,
        benchmark: Option<&CoinId>,
    ) -> Result<BetaReport, EngineError> {
        self.validate_days(days)?;
        self.validate_coins(coins)?;

        let benchmark = benchmark.unwrap_or(&self.options.benchmark).clone();
        let key = self.key(AnalysisKind::Beta, coins, days, None, Some(benchmark.clone()));
        let engine = self.clone();
        let coins = coins.to_vec();
        self.betas
            .get_or_compute_if(
                key,
                move || async move { engine.compute_beta(coins, days, benchmark).await },
                |report: &BetaReport| !report.has_upstream_gaps(),
            )
            .await
    }

    // --- Validation and keys ---

    fn validate_days(&self, days: u32) -> Result<(), EngineError> {
        if self.options.allowed_days.contains(&days) {
            return Ok(());
        }
        Err(EngineError::InvalidInput(format!(
            "days must be one of {:?}, got {days}",
            self.options.allowed_days
        )))
    }

    fn validate_coins(&self, coins: &[CoinId]) -> Result<(), EngineError> {
        if coins.is_empty() {
            return Err(EngineError::InvalidInput(
                "at least one coin is required".to_string(),
            ));
        }
        if coins.len() > self.options.max_coins {
            return Err(EngineError::InvalidInput(format!(
                "at most {} coins per request, got {}",
                self.options.max_coins,
                coins.len()
            )));
        }
        Ok(())
    }

    fn key(
        &self,
        kind: AnalysisKind,
        coins: &[CoinId],
        days: u32,
        window: Option<usize>,
        benchmark: Option<CoinId>,
    ) -> RequestKey {
        let width = self.options.time_bucket.as_secs().max(1) as i64;
        RequestKey {
            kind,
            coins: coins.to_vec(),
            days,
            window,
            benchmark,
            bucket: self.clock.now().timestamp().div_euclid(width),
        }
    }

    // --- Computations (run once per cache miss) ---

    async fn compute_matrix(&self, coins: Vec<CoinId>, days: u32) -> Result<MatrixReport, EngineError> {
        let as_of = self.clock.now();
        let fetched = fetch_all(&self.client, &coins, days).await;
        if fetched.series.is_empty() {
            return Err(nothing_usable(&fetched.skipped));
        }

        let Alignment { matrix, skipped } = analytics::align(fetched.series);
        let mut skipped = [fetched.skipped, skipped].concat();
        in_request_order(&coins, &mut skipped);
        if matrix.is_empty() {
            return Err(nothing_usable(&skipped));
        }

        let correlations = analytics::correlation_matrix(&matrix);
        tracing::info!(
            coins = matrix.len(),
            skipped = skipped.len(),
            observations = matrix.observations(),
            days,
            "Computed correlation matrix."
        );

        Ok(MatrixReport {
            coins,
            days,
            matrix: correlations,
            observations: matrix.observations(),
            skipped,
            as_of,
        })
    }

    async fn compute_rolling(
        &self,
        coin_a: CoinId,
        coin_b: CoinId,
        days: u32,
        window: usize,
    ) -> Result<RollingReport, EngineError> {
        let as_of = self.clock.now();
        let wanted = if coin_a == coin_b {
            vec![coin_a.clone()]
        } else {
            vec![coin_a.clone(), coin_b.clone()]
        };

        let (returns, skipped) = self.returns_per_coin(&wanted, days).await;
        if let Some(skip) = skipped.first() {
            return Err(required_coin_missing(skip));
        }
        let (Some(a), Some(b)) = (find(&returns, &coin_a), find(&returns, &coin_b)) else {
            return Err(EngineError::InsufficientData(format!("{coin_a} / {coin_b}")));
        };

        let series = analytics::rolling(a, b, window)?;
        tracing::info!(
            coin_a = %coin_a,
            coin_b = %coin_b,
            window,
            points = series.len(),
            "Computed rolling correlation."
        );

        Ok(RollingReport {
            coin_a,
            coin_b,
            days,
            window,
            series: series.points,
            as_of,
        })
    }

    async fn compute_beta(
        &self,
        coins: Vec<CoinId>,
        days: u32,
        benchmark: CoinId,
    ) -> Result<BetaReport, EngineError> {
        let as_of = self.clock.now();
        let mut wanted = coins.clone();
        if !wanted.contains(&benchmark) {
            wanted.push(benchmark.clone());
        }

        let (returns, mut skipped) = self.returns_per_coin(&wanted, days).await;
        let Some(bench) = find(&returns, &benchmark) else {
            let outage = skipped
                .iter()
                .any(|s| s.coin == benchmark && s.reason == SkipReason::UpstreamUnavailable);
            return Err(if outage {
                EngineError::UpstreamUnavailable(format!("could not fetch benchmark {benchmark}"))
            } else {
                AnalyticsError::BenchmarkMissing(benchmark).into()
            });
        };

        let requested: Vec<ReturnSeries> = returns
            .iter()
            .filter(|r| coins.contains(r.coin()))
            .cloned()
            .collect();
        skipped.retain(|s| coins.contains(&s.coin));
        if requested.is_empty() {
            return Err(nothing_usable(&skipped));
        }

        let result = analytics::beta_against(bench, &requested);
        tracing::info!(
            benchmark = %benchmark,
            coins = result.results.len(),
            skipped = skipped.len(),
            days,
            "Computed betas."
        );

        Ok(BetaReport {
            benchmark,
            coins,
            days,
            results: result.results,
            skipped,
            as_of,
        })
    }

    /// Fetches `coins` and turns each into returns on its own calendar.
    async fn returns_per_coin(
        &self,
        coins: &[CoinId],
        days: u32,
    ) -> (Vec<ReturnSeries>, Vec<SkippedCoin>) {
        let fetched = fetch_all(&self.client, coins, days).await;
        let mut skipped = fetched.skipped;
        let mut returns = Vec::with_capacity(fetched.series.len());
        for (coin, series) in fetched.series {
            match analytics::returns_of(coin, series) {
                Ok(r) => returns.push(r),
                Err(skip) => skipped.push(skip),
            }
        }
        in_request_order(coins, &mut skipped);
        (returns, skipped)
    }
}

fn find<'a>(returns: &'a [ReturnSeries], coin: &CoinId) -> Option<&'a ReturnSeries> {
    returns.iter().find(|r| r.coin() == coin)
}
