use crate::ListingSource;
use crate::binance::BinanceProvider;
use crate::error::ApiError;
use crate::http;
use crate::symbols::{self, COIN_SYMBOLS};
use cache::{Clock, ResultCache, SystemClock};
use configuration::ProviderSettings;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One searchable coin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub category: String,
}

impl CoinListing {
    fn from_ticker(id: &str, ticker: &str) -> Self {
        let lower = ticker.to_lowercase();
        Self {
            id: id.to_string(),
            symbol: ticker.to_uppercase(),
            name: symbols::display_name(&lower),
            category: symbols::category(&lower).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingOrigin {
    /// Fetched from the exchange by this call.
    Binance,
    /// An exchange listing fetched earlier and still within its TTL.
    Cache,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinListings {
    pub coins: Vec<CoinListing>,
    pub source: ListingOrigin,
}

/// Coin metadata for name resolution, refreshed from the exchange at most
/// once per TTL and falling back to the built-in table.
#[derive(Clone)]
pub struct CoinDirectory {
    source: Arc<dyn ListingSource>,
    listings: ResultCache<(), Vec<CoinListing>, ApiError>,
    ttl: Duration,
}

impl CoinDirectory {
    pub fn new(source: Arc<dyn ListingSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            listings: ResultCache::new(ttl, 1, clock),
            ttl,
        }
    }

    /// Lists coins from Binance `exchangeInfo` on the wall clock.
    pub fn from_settings(settings: &ProviderSettings, ttl: Duration) -> Result<Self, ApiError> {
        let http = http::build_client(&settings.user_agent, settings.request_timeout)?;
        let source = BinanceProvider::new(http, &settings.binance_url);
        Ok(Self::new(Arc::new(source), ttl, Arc::new(SystemClock)))
    }

    pub fn cache_duration(&self) -> Duration {
        self.ttl
    }

    /// Ids of the coins with a known ticker mapping.
    pub fn static_ids() -> Vec<&'static str> {
        COIN_SYMBOLS.iter().map(|(id, _)| *id).collect()
    }

    pub fn static_listings() -> Vec<CoinListing> {
        COIN_SYMBOLS
            .iter()
            .map(|(id, ticker)| CoinListing::from_ticker(id, ticker))
            .collect()
    }

    /// Every tradable coin. A failed refresh is not cached and is served from
    /// the static table instead.
    pub async fn all(&self) -> CoinListings {
        let source = Arc::clone(&self.source);
        let refreshed = Arc::new(AtomicBool::new(false));
        let marker = Arc::clone(&refreshed);
        let fetched = self
            .listings
            .get_or_compute((), move || async move {
                marker.store(true, Ordering::SeqCst);
                let assets = source.list_assets().await?;
                if assets.is_empty() {
                    return Err(ApiError::InvalidData("exchange listed no coins".to_string()));
                }
                Ok::<_, ApiError>(
                    assets
                        .iter()
                        .map(|asset| CoinListing::from_ticker(asset, asset))
                        .collect::<Vec<_>>(),
                )
            })
            .await;

        match fetched {
            Ok(coins) => CoinListings {
                coins,
                source: if refreshed.load(Ordering::SeqCst) {
                    ListingOrigin::Binance
                } else {
                    ListingOrigin::Cache
                },
            },
            Err(e) => {
                tracing::warn!(error = %e, "Coin list refresh failed, using the static table.");
                CoinListings {
                    coins: Self::static_listings(),
                    source: ListingOrigin::Static,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cache::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;

    struct Listing {
        result: Result<Vec<String>, ApiError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ListingSource for Listing {
        async fn list_assets(&self) -> Result<Vec<String>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()))
    }

    #[tokio::test]
    async fn exchange_listing_is_cached_for_the_ttl() {
        let source = Arc::new(Listing {
            result: Ok(vec!["btc".to_string(), "pepe".to_string()]),
            calls: AtomicUsize::new(0),
        });
        let clock = clock();
        let directory = CoinDirectory::new(source.clone(), Duration::from_secs(3600), clock.clone());

        let first = directory.all().await;
        assert_eq!(first.source, ListingOrigin::Binance);
        assert_eq!(
            first.coins[0],
            CoinListing {
                id: "btc".to_string(),
                symbol: "BTC".to_string(),
                name: "Bitcoin".to_string(),
                category: "Layer 1".to_string(),
            }
        );
        let second = directory.all().await;
        assert_eq!(second.source, ListingOrigin::Cache);
        assert_eq!(second.coins, first.coins);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(directory.all().await.source, ListingOrigin::Binance);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_static_table() {
        let source = Arc::new(Listing {
            result: Err(ApiError::Transient("HTTP 502".to_string())),
            calls: AtomicUsize::new(0),
        });
        let directory = CoinDirectory::new(source.clone(), Duration::from_secs(3600), clock());

        let listings = directory.all().await;
        assert_eq!(listings.source, ListingOrigin::Static);
        assert_eq!(listings.coins.len(), COIN_SYMBOLS.len());
        let doge = listings.coins.iter().find(|c| c.id == "dogecoin").unwrap();
        assert_eq!((doge.symbol.as_str(), doge.category.as_str()), ("DOGE", "Meme"));

        directory.all().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
