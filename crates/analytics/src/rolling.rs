use crate::aligner::align_pair;
use crate::error::AnalyticsError;
use crate::stats::{MIN_OBSERVATIONS, pearson};
use chrono::NaiveDate;
use core_types::{CoinId, ReturnSeries};
use serde::Serialize;

/// One window position: the correlation over the `window` observations
/// ending on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingCorrelationSeries {
    pub coin_a: CoinId,
    pub coin_b: CoinId,
    pub window: usize,
    pub points: Vec<RollingPoint>,
}

impl RollingCorrelationSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Slides a `window`-sized Pearson correlation across the common dates of `a` and `b`.
///
/// Each point is stamped with the last date of its window. The window is
/// validated against the raw input lengths; if date matching then leaves
/// fewer than `window` pairs the series is simply empty.
pub fn rolling(
    a: &ReturnSeries,
    b: &ReturnSeries,
    window: usize,
) -> Result<RollingCorrelationSeries, AnalyticsError> {
    let available = a.len().min(b.len());
    if window < MIN_OBSERVATIONS || window > available {
        return Err(AnalyticsError::InvalidWindow { window, available });
    }

    let paired = align_pair(a, b);
    let points = if paired.len() < window {
        tracing::debug!(
            coin_a = %a.coin(),
            coin_b = %b.coin(),
            paired = paired.len(),
            window,
            "Not enough shared dates for a single window."
        );
        Vec::new()
    } else {
        (0..=paired.len() - window)
            .map(|start| {
                let end = start + window;
                RollingPoint {
                    date: paired.dates[end - 1],
                    correlation: pearson(&paired.a[start..end], &paired.b[start..end]),
                }
            })
            .collect()
    };

    Ok(RollingCorrelationSeries {
        coin_a: a.coin().clone(),
        coin_b: b.coin().clone(),
        window,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn returns(id: &str, days: &[u32], values: &[f64]) -> ReturnSeries {
        ReturnSeries::new(
            CoinId::parse(id).unwrap(),
            days.iter().map(|d| day(*d)).collect(),
            values.to_vec(),
        )
        .unwrap()
    }

    const A: [f64; 8] = [0.01, -0.02, 0.03, 0.01, -0.01, 0.02, -0.03, 0.04];

    #[test]
    fn one_point_per_window_position() {
        let days: Vec<u32> = (1..=8).collect();
        let a = returns("a", &days, &A);
        let b = returns("b", &days, &A);

        for window in 2..=8 {
            let series = rolling(&a, &b, window).unwrap();
            assert_eq!(series.len(), 8 - window + 1);
            assert_eq!(series.points.last().unwrap().date, day(8));
            assert_eq!(series.points[0].date, day(window as u32));
            for point in &series.points {
                assert!((point.correlation.unwrap() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn invalid_windows_are_rejected() {
        let days: Vec<u32> = (1..=8).collect();
        let a = returns("a", &days, &A);
        let b = returns("b", &days[..5], &A[..5]);

        assert_eq!(
            rolling(&a, &b, 1),
            Err(AnalyticsError::InvalidWindow { window: 1, available: 5 })
        );
        assert_eq!(
            rolling(&a, &b, 6),
            Err(AnalyticsError::InvalidWindow { window: 6, available: 5 })
        );
        assert!(rolling(&a, &b, 5).is_ok());
    }

    #[test]
    fn sparse_overlap_gives_an_empty_series() {
        let a = returns("a", &[1, 2, 3, 4], &A[..4]);
        let b = returns("b", &[3, 4, 5, 6], &A[..4]);

        let series = rolling(&a, &b, 3).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn flat_window_is_undefined() {
        let days: Vec<u32> = (1..=5).collect();
        let a = returns("a", &days, &[0.0, 0.0, 0.0, 0.01, 0.02]);
        let b = returns("b", &days, &[0.01, 0.02, 0.03, 0.01, 0.05]);

        let series = rolling(&a, &b, 3).unwrap();
        assert_eq!(series.points[0].correlation, None);
        assert!(series.points[2].correlation.is_some());
    }
}
