use crate::error::EngineError;
use api_client::MarketDataClient;
use api_client::error::ApiError;
use core_types::{CoinId, PriceSeries, SkipReason, SkippedCoin};
use futures::future::join_all;

/// Price histories for one request: what arrived, and what did not.
#[derive(Debug, Default)]
pub(crate) struct Fetched {
    pub series: Vec<(CoinId, PriceSeries)>,
    pub skipped: Vec<SkippedCoin>,
}

/// Fetches every coin concurrently. The client bounds the actual fan-out.
pub(crate) async fn fetch_all(client: &MarketDataClient, coins: &[CoinId], days: u32) -> Fetched {
    let results = join_all(coins.iter().map(|coin| client.fetch_series(coin, days))).await;

    let mut fetched = Fetched::default();
    for (coin, result) in coins.iter().zip(results) {
        match result {
            Ok(series) if series.is_empty() => {
                fetched
                    .skipped
                    .push(SkippedCoin::new(coin.clone(), SkipReason::NoData));
            }
            Ok(series) => fetched.series.push((coin.clone(), series)),
            Err(e) => {
                let reason = skip_reason(&e);
                tracing::warn!(coin = %coin, days, error = %e, ?reason, "Skipping coin.");
                fetched.skipped.push(SkippedCoin::new(coin.clone(), reason));
            }
        }
    }
    fetched
}

fn skip_reason(error: &ApiError) -> SkipReason {
    match error {
        ApiError::NotFound(_) | ApiError::Rejected(_) => SkipReason::NoData,
        ApiError::Deserialization(_) | ApiError::InvalidData(_) => SkipReason::InvalidPrices,
        ApiError::RateLimited { .. } | ApiError::Transient(_) | ApiError::UpstreamUnavailable(_) => {
            SkipReason::UpstreamUnavailable
        }
    }
}

/// The single error reported when no coin of a request is usable.
///
/// An outage wins over "no data" so the caller knows a retry may help.
pub(crate) fn nothing_usable(skipped: &[SkippedCoin]) -> EngineError {
    let coins_with = |reason: SkipReason| -> Vec<CoinId> {
        skipped
            .iter()
            .filter(|s| s.reason == reason)
            .map(|s| s.coin.clone())
            .collect()
    };

    let down = coins_with(SkipReason::UpstreamUnavailable);
    if !down.is_empty() {
        return EngineError::UpstreamUnavailable(format!(
            "could not fetch {}",
            down.iter().map(CoinId::as_str).collect::<Vec<_>>().join(", ")
        ));
    }

    let missing = coins_with(SkipReason::NoData);
    if missing.len() == skipped.len() {
        return EngineError::NoData(missing);
    }

    EngineError::InsufficientData(
        skipped
            .iter()
            .map(|s| format!("{} ({})", s.coin, s.reason))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// The error for a coin that a computation cannot do without.
pub(crate) fn required_coin_missing(skip: &SkippedCoin) -> EngineError {
    nothing_usable(std::slice::from_ref(skip))
}

/// Orders skips by the coin's position in the request.
pub(crate) fn in_request_order(requested: &[CoinId], skipped: &mut [SkippedCoin]) {
    skipped.sort_by_key(|s| {
        requested
            .iter()
            .position(|c| *c == s.coin)
            .unwrap_or(usize::MAX)
    });
}
