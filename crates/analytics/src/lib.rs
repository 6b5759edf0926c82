//! # Correlation Analytics
//!
//! Pure calculators that turn per-coin price histories into statistics.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** no I/O and no clock. Depends only on `core-types`.
//! - **Partial results over failures:** a coin that cannot be used is reported
//!   in a skip list, and an undefined coefficient is `None`, never `NaN`.
//!
//! ## Public API
//!
//! - [`align`] / [`align_pair`]: the Series Aligner.
//! - [`correlation_matrix`], [`rolling`], [`beta_against`]: the calculators.
//! - [`returns_of`]: one coin on its own calendar, for pairwise statistics.
//! - [`AnalyticsError`]: window and benchmark failures.

pub mod aligner;
pub mod beta;
pub mod correlation;
pub mod error;
pub mod rolling;
pub mod stats;

pub use aligner::{
    AlignedReturnMatrix, Alignment, MIN_ALIGNED_PRICES, PairedReturns, align, align_pair, returns_of,
};
pub use beta::{BetaEstimate, BetaResult, beta, beta_against};
pub use correlation::{CorrelationMatrix, correlation_matrix};
pub use error::AnalyticsError;
pub use rolling::{RollingCorrelationSeries, RollingPoint, rolling};
