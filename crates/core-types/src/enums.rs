use crate::coin::CoinId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a requested coin is missing from a result.
///
/// The client renders "no data for this coin" differently from "the upstream
/// is unavailable", so the two must never be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No provider knows the coin, or it has no price history.
    NoData,
    /// The providers kept failing after the retry budget was spent.
    UpstreamUnavailable,
    /// The series contained a zero or negative price.
    InvalidPrices,
    /// Too few observations left after aligning with the other coins.
    InsufficientHistory,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::NoData => "no data for this coin",
            SkipReason::UpstreamUnavailable => "upstream market data unavailable",
            SkipReason::InvalidPrices => "price history contains non-positive prices",
            SkipReason::InsufficientHistory => "not enough overlapping price history",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A coin omitted from a result, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCoin {
    pub coin: CoinId,
    pub reason: SkipReason,
}

impl SkippedCoin {
    pub fn new(coin: CoinId, reason: SkipReason) -> Self {
        Self { coin, reason }
    }
}
