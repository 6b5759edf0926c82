use analytics::AnalyticsError;
use core_types::{CoinId, CoreError};
use thiserror::Error;

/// Request-level failures of the correlation engine.
///
/// Per-coin problems are not errors: they become entries in a report's
/// `skipped` list. These variants are for when nothing useful can be returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("No price data available for: {}", join(.0))]
    NoData(Vec<CoinId>),

    #[error("Not enough price history: {0}")]
    InsufficientData(String),

    #[error("Market data provider unavailable, please retry later ({0})")]
    UpstreamUnavailable(String),
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}

fn join(coins: &[CoinId]) -> String {
    coins
        .iter()
        .map(CoinId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
