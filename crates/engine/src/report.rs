use analytics::{BetaEstimate, CorrelationMatrix, RollingPoint};
use chrono::{DateTime, Utc};
use core_types::{CoinId, SkipReason, SkippedCoin};
use indexmap::IndexMap;
use serde::Serialize;

/// Pairwise correlations of the requested coins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixReport {
    /// The coins as requested, including skipped ones.
    pub coins: Vec<CoinId>,
    pub days: u32,
    pub matrix: CorrelationMatrix,
    /// Return observations per coin on the common calendar.
    pub observations: usize,
    pub skipped: Vec<SkippedCoin>,
    #[serde(rename = "timestamp")]
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingReport {
    pub coin_a: CoinId,
    pub coin_b: CoinId,
    pub days: u32,
    pub window: usize,
    pub series: Vec<RollingPoint>,
    #[serde(rename = "timestamp")]
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetaReport {
    pub benchmark: CoinId,
    pub coins: Vec<CoinId>,
    pub days: u32,
    pub results: IndexMap<CoinId, BetaEstimate>,
    pub skipped: Vec<SkippedCoin>,
    #[serde(rename = "timestamp")]
    pub as_of: DateTime<Utc>,
}

/// A result with coins missing because of an outage would go stale the moment
/// the provider recovers, so it is served but not cached.
pub(crate) fn has_upstream_gaps(skipped: &[SkippedCoin]) -> bool {
    skipped
        .iter()
        .any(|s| s.reason == SkipReason::UpstreamUnavailable)
}

impl MatrixReport {
    pub fn has_upstream_gaps(&self) -> bool {
        has_upstream_gaps(&self.skipped)
    }
}

impl BetaReport {
    pub fn has_upstream_gaps(&self) -> bool {
        has_upstream_gaps(&self.skipped)
    }
}
