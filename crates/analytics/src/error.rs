use core_types::CoinId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Invalid window {window}: must be at least 2 and at most {available} (the shorter series)")]
    InvalidWindow { window: usize, available: usize },

    #[error("Benchmark '{0}' has no usable price history")]
    BenchmarkMissing(CoinId),
}
