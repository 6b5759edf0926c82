use crate::PriceProvider;
use crate::error::ApiError;
use crate::http;
use async_trait::async_trait;
use core_types::{CoinId, PricePoint, PriceSeries};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Daily closes from CoinGecko's `market_chart`, keyed by CoinGecko id.
#[derive(Clone)]
pub struct CoinGeckoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct MarketChart {
    prices: Vec<(i64, Decimal)>,
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_daily_closes(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin);
        let days = days.to_string();
        let request = self.client.get(&url).query(&[
            ("vs_currency", "usd"),
            ("days", days.as_str()),
            ("interval", "daily"),
        ]);
        let response = http::send(request).await?;
        tracing::debug!(coin = %coin, status = %response.status, "CoinGecko market_chart response.");

        if !response.status.is_success() {
            return Err(http::status_error(coin.as_str(), &response));
        }
        parse_market_chart(coin.as_str(), &response.body)
    }
}

/// `{"prices": [[ms, price], ...]}`. CoinGecko appends the live price as an
/// extra point on the current day; later points of a day win.
pub(crate) fn parse_market_chart(coin: &str, body: &str) -> Result<PriceSeries, ApiError> {
    let chart: MarketChart =
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    if chart.prices.is_empty() {
        return Err(ApiError::NotFound(coin.to_string()));
    }

    let points = chart
        .prices
        .into_iter()
        .map(|(ms, price)| Ok(PricePoint::new(http::millis_to_utc(ms)?.date_naive(), price)))
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(PriceSeries::from_points(points))
}
