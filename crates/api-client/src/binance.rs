use crate::error::ApiError;
use crate::http::{self, RawResponse};
use crate::symbols;
use crate::{ListingSource, PriceProvider};
use async_trait::async_trait;
use core_types::{CoinId, PricePoint, PriceSeries};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Binance rejects unknown pairs with HTTP 400 and this code.
const INVALID_SYMBOL: i64 = -1121;

/// Daily klines from the Binance spot API.
#[derive(Clone)]
pub struct BinanceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

// Intermediate struct for deserializing klines from Binance API
#[derive(Deserialize)]
struct RawKline(i64, String, String, String, String, String, i64, String, i64, String, String, String);

#[derive(Deserialize)]
struct ErrorResponse {
    code: i64,
    msg: String,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    status: String,
    base_asset: String,
    quote_asset: String,
}

#[async_trait]
impl PriceProvider for BinanceProvider {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_daily_closes(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let symbol = symbols::usdt_pair(&symbols::ticker(coin.as_str()));
        let (start, end) = http::lookback_millis(days);
        let url = format!("{}/api/v3/klines", self.base_url);

        let (start, end, limit) = (start.to_string(), end.to_string(), days.to_string());

        let request = self.client.get(&url).query(&[
            ("symbol", symbol.as_str()),
            ("interval", "1d"),
            ("startTime", start.as_str()),
            ("endTime", end.as_str()),
            ("limit", limit.as_str()),
        ]);
        let response = http::send(request).await?;
        tracing::debug!(coin = %coin, %symbol, status = %response.status, "Binance klines response.");

        if !response.status.is_success() {
            return Err(classify(coin.as_str(), &response));
        }
        parse_klines(coin.as_str(), &response.body)
    }
}

#[async_trait]
impl ListingSource for BinanceProvider {
    async fn list_assets(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let response = http::send(self.client.get(&url)).await?;
        if !response.status.is_success() {
            return Err(classify("exchangeInfo", &response));
        }
        parse_exchange_info(&response.body)
    }
}

fn classify(coin: &str, response: &RawResponse) -> ApiError {
    if response.status == StatusCode::BAD_REQUEST {
        if let Ok(error) = serde_json::from_str::<ErrorResponse>(&response.body) {
            if error.code == INVALID_SYMBOL {
                return ApiError::NotFound(coin.to_string());
            }
            return ApiError::Rejected(format!("Binance error {}: {}", error.code, error.msg));
        }
    }
    http::status_error(coin, response)
}

/// Klines are `[openTime, open, high, low, close, volume, ...]`; the close is
/// stamped with the candle's opening day.
pub(crate) fn parse_klines(coin: &str, body: &str) -> Result<PriceSeries, ApiError> {
    let raw: Vec<RawKline> =
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    if raw.is_empty() {
        return Err(ApiError::NotFound(coin.to_string()));
    }

    let points = raw
        .into_iter()
        .map(|k| {
            Ok(PricePoint::new(
                http::millis_to_utc(k.0)?.date_naive(),
                Decimal::from_str(&k.4).map_err(|e| ApiError::Deserialization(e.to_string()))?,
            ))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(PriceSeries::from_points(points))
}

/// Lowercase base assets of every actively trading USDT pair, sorted.
pub(crate) fn parse_exchange_info(body: &str) -> Result<Vec<String>, ApiError> {
    let info: ExchangeInfo =
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;

    let assets: BTreeSet<String> = info
        .symbols
        .into_iter()
        .filter(|s| s.quote_asset == symbols::QUOTE_ASSET && s.status == "TRADING")
        .map(|s| s.base_asset.to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(assets.into_iter().collect())
}
