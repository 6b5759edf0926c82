use crate::error::ApiError;
use async_trait::async_trait;
use core_types::{CoinId, PriceSeries};

pub mod binance;
pub mod bitget;
pub mod client;
pub mod coingecko;
pub mod directory;
pub mod error;
pub mod fallback;
mod http;
pub mod rate_limit;
pub mod retry;
pub mod symbols;

// --- Public API ---
pub use binance::BinanceProvider;
pub use bitget::BitgetProvider;
pub use client::{ClientOptions, MarketDataClient};
pub use coingecko::CoinGeckoProvider;
pub use directory::{CoinDirectory, CoinListing, CoinListings, ListingOrigin};
pub use fallback::FallbackProvider;
pub use rate_limit::TokenBucket;
pub use retry::RetryPolicy;

/// A source of daily closing prices.
///
/// This trait is the seam the engine is tested through: the HTTP providers
/// implement it, and so do in-memory fakes.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Short source name used in logs.
    fn name(&self) -> &'static str;

    /// Daily closes of `coin` over the last `days` days, oldest first.
    async fn fetch_daily_closes(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError>;
}

/// A source of tradable coin tickers for the coin directory.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Lowercase base assets, sorted and unique.
    async fn list_assets(&self) -> Result<Vec<String>, ApiError>;
}
