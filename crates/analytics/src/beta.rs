use crate::aligner::align_pair;
use crate::stats::{pearson, slope};
use core_types::{CoinId, ReturnSeries};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Sensitivity of one coin to the benchmark, with the fit quality alongside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaEstimate {
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
}

impl BetaEstimate {
    pub const IDENTITY: Self = Self {
        beta: Some(1.0),
        correlation: Some(1.0),
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaResult {
    pub benchmark: CoinId,
    pub results: IndexMap<CoinId, BetaEstimate>,
}

/// `cov(coin, benchmark) / var(benchmark)` over the dates both series share.
pub fn beta(coin: &ReturnSeries, benchmark: &ReturnSeries) -> BetaEstimate {
    if coin.coin() == benchmark.coin() {
        return BetaEstimate::IDENTITY;
    }
    let paired = align_pair(coin, benchmark);
    BetaEstimate {
        beta: slope(&paired.b, &paired.a),
        correlation: pearson(&paired.a, &paired.b),
    }
}

/// Betas of every coin against `benchmark`, in the order given. Each pair is
/// matched on its own shared dates.
pub fn beta_against(benchmark: &ReturnSeries, coins: &[ReturnSeries]) -> BetaResult {
    let results = coins
        .iter()
        .map(|series| (series.coin().clone(), beta(series, benchmark)))
        .collect();

    BetaResult {
        benchmark: benchmark.coin().clone(),
        results,
    }
}
