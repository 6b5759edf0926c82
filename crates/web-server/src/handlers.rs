use crate::{AppState, error::AppError};
use api_client::{CoinDirectory, CoinListing, ListingOrigin};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::Uri,
};
use core_types::CoinId;
use engine::{BetaReport, MatrixReport, RollingReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_COIN_A: &str = "ethereum";
const DEFAULT_COIN_B: &str = "bitcoin";

#[derive(Debug, Default, Deserialize)]
pub struct MatrixQuery {
    pub coins: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RollingQuery {
    pub coin_a: Option<String>,
    pub coin_b: Option<String>,
    pub days: Option<u32>,
    pub window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BetaQuery {
    pub coins: Option<String>,
    pub days: Option<u32>,
    pub benchmark: Option<String>,
}

/// The CSV list from the query, or the configured default list.
fn coins_or_default(raw: Option<&str>, defaults: &[String]) -> Result<Vec<CoinId>, AppError> {
    let coins = match raw {
        Some(csv) => CoinId::parse_list(csv)?,
        None => CoinId::parse_list(&defaults.join(","))?,
    };
    Ok(coins)
}

/// # GET /api/correlation-matrix
pub async fn correlation_matrix(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MatrixQuery>, QueryRejection>,
) -> Result<Json<MatrixReport>, AppError> {
    let Query(query) = query?;
    let coins = coins_or_default(query.coins.as_deref(), &state.defaults.default_coins)?;
    let days = query.days.unwrap_or(state.defaults.default_days);

    let report = state.engine.correlation_matrix(&coins, days).await?;
    Ok(Json(report))
}

/// # GET /api/rolling-correlation
pub async fn rolling_correlation(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RollingQuery>, QueryRejection>,
) -> Result<Json<RollingReport>, AppError> {
    let Query(query) = query?;
    let coin_a = CoinId::parse(query.coin_a.as_deref().unwrap_or(DEFAULT_COIN_A))?;
    let coin_b = CoinId::parse(query.coin_b.as_deref().unwrap_or(DEFAULT_COIN_B))?;
    let days = query.days.unwrap_or(state.defaults.default_days);
    let window = query.window.unwrap_or(state.defaults.default_window);

    let report = state
        .engine
        .rolling_correlation(&coin_a, &coin_b, days, window)
        .await?;
    Ok(Json(report))
}

/// # GET /api/beta
/// Betas against `benchmark`, or the configured benchmark when omitted.
pub async fn beta(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BetaQuery>, QueryRejection>,
) -> Result<Json<BetaReport>, AppError> {
    let Query(query) = query?;
    let coins = coins_or_default(query.coins.as_deref(), &state.defaults.default_beta_coins)?;
    let days = query.days.unwrap_or(state.defaults.default_days);
    let benchmark = query.benchmark.as_deref().map(CoinId::parse).transpose()?;

    let report = state.engine.beta(&coins, days, benchmark.as_ref()).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct CoinIds {
    pub coins: Vec<&'static str>,
    pub source: ListingOrigin,
    pub count: usize,
}

/// # GET /api/coins
pub async fn coins() -> Json<CoinIds> {
    let coins = CoinDirectory::static_ids();
    Json(CoinIds {
        count: coins.len(),
        coins,
        source: ListingOrigin::Static,
    })
}

#[derive(Debug, Serialize)]
pub struct AllCoins {
    pub coins: Vec<CoinListing>,
    pub total: usize,
    /// Seconds a refreshed list is kept.
    pub cache_duration: u64,
    pub source: ListingOrigin,
}

/// # GET /api/coins/all
pub async fn all_coins(State(state): State<Arc<AppState>>) -> Json<AllCoins> {
    let listings = state.directory.all().await;
    Json(AllCoins {
        total: listings.coins.len(),
        coins: listings.coins,
        cache_duration: state.directory.cache_duration().as_secs(),
        source: listings.source,
    })
}

#[derive(Debug, Serialize)]
pub struct About {
    pub message: &'static str,
    pub version: &'static str,
}

/// # GET /
pub async fn root() -> Json<About> {
    Json(About {
        message: "Crypto Correlation Analytics API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::error::ApiError;
    use api_client::{ClientOptions, ListingSource, MarketDataClient, PriceProvider};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use cache::ManualClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use configuration::AnalyticsSettings;
    use core_types::{PricePoint, PriceSeries, SkipReason};
    use engine::error::EngineError;
    use engine::{CorrelationEngine, EngineOptions};
    use rust_decimal::Decimal;
    use std::time::Duration;

    /// Known coins trend up at different speeds with a weekly wobble.
    struct FakeMarket;

    #[async_trait]
    impl PriceProvider for FakeMarket {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_daily_closes(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
            let step = match coin.as_str() {
                "bitcoin" => 1,
                "ethereum" => 2,
                "solana" => 3,
                "cardano" => return Err(ApiError::UpstreamUnavailable("fake".into())),
                other => return Err(ApiError::NotFound(other.to_string())),
            };
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let points = (0..=i64::from(days))
                .map(|d| {
                    let close = Decimal::from(100 + step * d + (d * step) % 7);
                    PricePoint::new(start + chrono::Duration::days(d), close)
                })
                .collect();
            Ok(PriceSeries::from_points(points))
        }
    }

    #[async_trait]
    impl ListingSource for FakeMarket {
        async fn list_assets(&self) -> Result<Vec<String>, ApiError> {
            Ok(vec!["BTC".into(), "ETH".into()])
        }
    }

    fn state() -> Arc<AppState> {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        let options = ClientOptions {
            retry: api_client::RetryPolicy {
                max_retries: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let client = MarketDataClient::new(Arc::new(FakeMarket), options, clock.clone());
        let engine = CorrelationEngine::new(
            client,
            EngineOptions {
                benchmark: CoinId::parse("bitcoin").unwrap(),
                allowed_days: vec![7, 30, 90],
                max_coins: 20,
                result_ttl: Duration::from_secs(600),
                max_entries: 16,
                time_bucket: Duration::from_secs(86_400),
            },
            clock.clone(),
        );
        let directory = CoinDirectory::new(Arc::new(FakeMarket), Duration::from_secs(3600), clock);
        Arc::new(AppState {
            engine,
            directory,
            defaults: AnalyticsSettings::default(),
        })
    }

    #[tokio::test]
    async fn matrix_uses_the_default_coins() {
        let Json(report) = correlation_matrix(State(state()), Ok(Query(MatrixQuery::default())))
            .await
            .unwrap();
        assert_eq!(report.days, 30);
        assert_eq!(report.matrix.len(), 3);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn unknown_coin_is_reported_not_fatal() {
        let query = MatrixQuery {
            coins: Some("bitcoin, DoesNotExist ,ethereum,bitcoin".into()),
            days: Some(7),
        };
        let Json(report) = correlation_matrix(State(state()), Ok(Query(query)))
            .await
            .unwrap();
        assert_eq!(report.coins.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].coin.as_str(), "doesnotexist");
        assert_eq!(report.skipped[0].reason, SkipReason::NoData);
    }

    #[tokio::test]
    async fn only_unknown_coins_is_a_bad_request() {
        let query = MatrixQuery {
            coins: Some("foo,bar".into()),
            days: None,
        };
        let err = correlation_matrix(State(state()), Ok(Query(query)))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn outage_is_service_unavailable() {
        let query = MatrixQuery {
            coins: Some("cardano".into()),
            days: None,
        };
        let err = correlation_matrix(State(state()), Ok(Query(query)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(EngineError::UpstreamUnavailable(_))));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn rolling_defaults_to_ethereum_against_bitcoin() {
        let Json(report) = rolling_correlation(State(state()), Ok(Query(RollingQuery::default())))
            .await
            .unwrap();
        assert_eq!(report.coin_a.as_str(), "ethereum");
        assert_eq!(report.coin_b.as_str(), "bitcoin");
        assert_eq!(report.window, 7);
        assert_eq!(report.series.len(), 30 - 7 + 1);
    }

    #[tokio::test]
    async fn oversized_window_is_a_bad_request() {
        let query = RollingQuery {
            days: Some(7),
            window: Some(30),
            ..Default::default()
        };
        let err = rolling_correlation(State(state()), Ok(Query(query)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn beta_accepts_a_benchmark() {
        let query = BetaQuery {
            coins: Some("solana".into()),
            days: Some(30),
            benchmark: Some("ethereum".into()),
        };
        let Json(report) = beta(State(state()), Ok(Query(query))).await.unwrap();
        assert_eq!(report.benchmark.as_str(), "ethereum");
        assert!(report.results[&CoinId::parse("solana").unwrap()].beta.is_some());
    }

    #[tokio::test]
    async fn invalid_days_is_a_bad_request() {
        let query = BetaQuery {
            days: Some(365),
            ..Default::default()
        };
        let err = beta(State(state()), Ok(Query(query))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn coin_lists() {
        let Json(ids) = coins().await;
        assert_eq!(ids.count, ids.coins.len());
        assert!(ids.coins.contains(&"bitcoin"));

        let Json(all) = all_coins(State(state())).await;
        assert_eq!(all.total, 2);
        assert_eq!(all.cache_duration, 3600);
        assert_eq!(all.source, ListingOrigin::Binance);
    }

    #[tokio::test]
    async fn repeated_coin_list_is_served_from_cache() {
        let state = state();
        let Json(first) = all_coins(State(state.clone())).await;
        let Json(second) = all_coins(State(state)).await;
        assert_eq!(first.source, ListingOrigin::Binance);
        assert_eq!(second.source, ListingOrigin::Cache);
        assert_eq!(second.total, first.total);
    }
}
