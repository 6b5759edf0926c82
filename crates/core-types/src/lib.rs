pub mod coin;
pub mod enums;
pub mod error;
pub mod series;

// Re-export the core types to provide a clean public API.
pub use coin::CoinId;
pub use enums::{SkipReason, SkippedCoin};
pub use error::CoreError;
pub use series::{PricePoint, PriceSeries, ReturnSeries};
