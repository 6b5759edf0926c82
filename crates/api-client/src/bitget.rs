use crate::PriceProvider;
use crate::error::ApiError;
use crate::http::{self, RawResponse};
use crate::symbols;
use async_trait::async_trait;
use core_types::{CoinId, PricePoint, PriceSeries};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

const SUCCESS_CODE: &str = "00000";
/// "Parameter does not exist" and "symbol has been removed".
const UNKNOWN_SYMBOL_CODES: [&str; 2] = ["40034", "40309"];

/// Daily candles from the Bitget v2 spot API. Only coins with a known
/// ticker mapping are attempted.
#[derive(Clone)]
pub struct BitgetProvider {
    client: reqwest::Client,
    base_url: String,
}

impl BitgetProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct CandleResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<String>>,
}

#[async_trait]
impl PriceProvider for BitgetProvider {
    fn name(&self) -> &'static str {
        "bitget"
    }

    async fn fetch_daily_closes(&self, coin: &CoinId, days: u32) -> Result<PriceSeries, ApiError> {
        let Some(ticker) = symbols::known_ticker(coin.as_str()) else {
            return Err(ApiError::NotFound(coin.to_string()));
        };
        let symbol = symbols::usdt_pair(ticker);
        let (start, end) = http::lookback_millis(days);
        let url = format!("{}/api/v2/spot/market/candles", self.base_url);

        let (start, end, limit) = (start.to_string(), end.to_string(), days.to_string());

        let request = self.client.get(&url).query(&[
            ("symbol", symbol.as_str()),
            ("granularity", "1day"),
            ("startTime", start.as_str()),
            ("endTime", end.as_str()),
            ("limit", limit.as_str()),
        ]);
        let response = http::send(request).await?;
        tracing::debug!(coin = %coin, %symbol, status = %response.status, "Bitget candles response.");

        if !response.status.is_success() {
            return Err(classify(coin.as_str(), &response));
        }
        parse_candles(coin.as_str(), &response.body)
    }
}

/// Bitget answers an unknown symbol with a 400 carrying its own error code.
fn classify(coin: &str, response: &RawResponse) -> ApiError {
    if response.status == StatusCode::BAD_REQUEST {
        if let Ok(error) = serde_json::from_str::<CandleResponse>(&response.body) {
            if UNKNOWN_SYMBOL_CODES.contains(&error.code.as_str()) {
                return ApiError::NotFound(coin.to_string());
            }
            return ApiError::Rejected(format!("Bitget error {}: {}", error.code, error.msg));
        }
    }
    http::status_error(coin, response)
}

/// Rows are `[ts, open, high, low, close, ...]` as strings, newest first.
pub(crate) fn parse_candles(coin: &str, body: &str) -> Result<PriceSeries, ApiError> {
    let response: CandleResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    if response.code != SUCCESS_CODE {
        tracing::debug!(coin, code = %response.code, msg = %response.msg, "Bitget refused the symbol.");
        return Err(ApiError::NotFound(coin.to_string()));
    }
    if response.data.is_empty() {
        return Err(ApiError::NotFound(coin.to_string()));
    }

    let points = response
        .data
        .iter()
        .map(|row| {
            let (Some(ts), Some(close)) = (row.first(), row.get(4)) else {
                return Err(ApiError::InvalidData(format!("Short candle row: {row:?}")));
            };
            let ms = ts
                .parse::<i64>()
                .map_err(|e| ApiError::InvalidData(format!("Invalid timestamp '{ts}': {e}")))?;
            let close =
                Decimal::from_str(close).map_err(|e| ApiError::Deserialization(e.to_string()))?;
            Ok(PricePoint::new(http::millis_to_utc(ms)?.date_naive(), close))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(PriceSeries::from_points(points))
}
