use crate::stats::MIN_OBSERVATIONS;
use chrono::NaiveDate;
use core_types::{CoinId, PriceSeries, ReturnSeries, SkipReason, SkippedCoin};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Aligned prices needed to produce [`MIN_OBSERVATIONS`] returns.
pub const MIN_ALIGNED_PRICES: usize = MIN_OBSERVATIONS + 1;

/// Return series for several coins over one shared, ascending calendar.
///
/// Every series has the same dates and therefore the same length, which is
/// at least [`MIN_OBSERVATIONS`] whenever the matrix is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedReturnMatrix {
    dates: Vec<NaiveDate>,
    series: Vec<ReturnSeries>,
}

impl AlignedReturnMatrix {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn series(&self) -> &[ReturnSeries] {
        &self.series
    }

    pub fn get(&self, coin: &CoinId) -> Option<&ReturnSeries> {
        self.series.iter().find(|s| s.coin() == coin)
    }

    pub fn coins(&self) -> impl Iterator<Item = &CoinId> {
        self.series.iter().map(ReturnSeries::coin)
    }

    pub fn contains(&self, coin: &CoinId) -> bool {
        self.get(coin).is_some()
    }

    /// Number of coins.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of return observations per coin.
    pub fn observations(&self) -> usize {
        self.dates.len()
    }
}

/// Output of [`align`]: the usable coins plus the ones that had to be left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    pub matrix: AlignedReturnMatrix,
    pub skipped: Vec<SkippedCoin>,
}

/// Reconciles price histories onto a common calendar and converts them to returns.
///
/// 1. Coins with a zero or negative price are skipped as `InvalidPrices`.
/// 2. The strict intersection of all remaining coins' dates is taken. While it
///    is too short to support a statistic, the coin with the fewest
///    observations (the later-requested one on ties) is skipped as
///    `InsufficientHistory` and the intersection is recomputed.
/// 3. Each surviving coin's closes on the common dates become
///    `(p[i] - p[i-1]) / p[i-1]`.
///
/// Coins keep their input order in both the matrix and the skip list.
pub fn align(input: Vec<(CoinId, PriceSeries)>) -> Alignment {
    let mut skipped: Vec<(usize, SkippedCoin)> = Vec::new();
    let mut candidates: Vec<(usize, CoinId, PriceSeries)> = Vec::new();

    for (index, (coin, series)) in input.into_iter().enumerate() {
        if series.points().iter().any(|p| p.close <= Decimal::ZERO) {
            tracing::warn!(coin = %coin, "Skipping coin with non-positive prices.");
            skipped.push((index, SkippedCoin::new(coin, SkipReason::InvalidPrices)));
        } else if series.len() < MIN_ALIGNED_PRICES {
            skipped.push((index, SkippedCoin::new(coin, SkipReason::InsufficientHistory)));
        } else {
            candidates.push((index, coin, series));
        }
    }

    let common = loop {
        let common = intersect_dates(candidates.iter().map(|(_, _, series)| series));
        if common.len() >= MIN_ALIGNED_PRICES || candidates.len() <= 1 {
            break common;
        }

        let shortest = candidates
            .iter()
            .enumerate()
            .min_by(|(ia, (_, _, a)), (ib, (_, _, b))| {
                // Ties go to the later-requested coin.
                a.len().cmp(&b.len()).then(ib.cmp(ia))
            })
            .map(|(position, _)| position)
            .unwrap_or(0);
        let (index, coin, series) = candidates.remove(shortest);
        tracing::debug!(
            coin = %coin,
            observations = series.len(),
            "Dropping coin to widen the common calendar."
        );
        skipped.push((index, SkippedCoin::new(coin, SkipReason::InsufficientHistory)));
    };

    let mut matrix = AlignedReturnMatrix {
        dates: common.iter().skip(1).copied().collect(),
        series: Vec::with_capacity(candidates.len()),
    };

    for (index, coin, series) in candidates {
        let closes: Vec<Decimal> = series
            .points()
            .iter()
            .filter(|p| common.contains(&p.date))
            .map(|p| p.close)
            .collect();

        let returns = simple_returns(&closes)
            .and_then(|values| ReturnSeries::new(coin.clone(), matrix.dates.clone(), values).ok());
        match returns {
            Some(returns) => matrix.series.push(returns),
            None => skipped.push((index, SkippedCoin::new(coin, SkipReason::InvalidPrices))),
        }
    }

    if matrix.series.is_empty() {
        matrix.dates.clear();
    }

    skipped.sort_by_key(|(index, _)| *index);
    Alignment {
        matrix,
        skipped: skipped.into_iter().map(|(_, skip)| skip).collect(),
    }
}

/// Returns of a single coin on its own calendar, or the reason it is unusable.
pub fn returns_of(coin: CoinId, series: PriceSeries) -> Result<ReturnSeries, SkippedCoin> {
    let unusable = SkippedCoin::new(coin.clone(), SkipReason::InsufficientHistory);
    let mut alignment = align(vec![(coin, series)]);
    alignment
        .matrix
        .series
        .pop()
        .ok_or_else(|| alignment.skipped.pop().unwrap_or(unusable))
}

fn intersect_dates<'a>(mut series: impl Iterator<Item = &'a PriceSeries>) -> BTreeSet<NaiveDate> {
    let Some(first) = series.next() else {
        return BTreeSet::new();
    };
    let mut common: BTreeSet<NaiveDate> = first.dates().collect();
    for other in series {
        let dates: BTreeSet<NaiveDate> = other.dates().collect();
        common.retain(|d| dates.contains(d));
    }
    common
}

/// `None` if any step cannot be represented (overflow or a zero base).
fn simple_returns(closes: &[Decimal]) -> Option<Vec<f64>> {
    closes
        .windows(2)
        .map(|w| (w[1] - w[0]).checked_div(w[0])?.to_f64())
        .collect()
}

/// Two return series restricted to the dates they both cover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairedReturns {
    pub dates: Vec<NaiveDate>,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl PairedReturns {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Pairs up the observations of `a` and `b` that fall on the same date.
///
/// Usable on its own, independently of [`align`], so coins with different
/// data gaps can be compared pair by pair.
pub fn align_pair(a: &ReturnSeries, b: &ReturnSeries) -> PairedReturns {
    let mut paired = PairedReturns::default();
    let (mut i, mut j) = (0, 0);
    let (dates_a, dates_b) = (a.dates(), b.dates());

    while i < dates_a.len() && j < dates_b.len() {
        match dates_a[i].cmp(&dates_b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                paired.dates.push(dates_a[i]);
                paired.a.push(a.values()[i]);
                paired.b.push(b.values()[j]);
                i += 1;
                j += 1;
            }
        }
    }

    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PricePoint;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn coin(id: &str) -> CoinId {
        CoinId::parse(id).unwrap()
    }

    fn series(points: &[(u32, Decimal)]) -> PriceSeries {
        PriceSeries::from_points(points.iter().map(|(d, p)| PricePoint::new(day(*d), *p)).collect())
    }

    #[test]
    fn aligns_on_strict_intersection() {
        let alignment = align(vec![
            (coin("bitcoin"), series(&[(1, dec!(100)), (2, dec!(110)), (3, dec!(121)), (4, dec!(110))])),
            (coin("ethereum"), series(&[(1, dec!(10)), (3, dec!(12)), (4, dec!(6)), (5, dec!(7))])),
        ]);

        assert!(alignment.skipped.is_empty());
        let m = &alignment.matrix;
        assert_eq!(m.dates(), &[day(3), day(4)]);
        assert_eq!(m.observations(), 2);

        let btc = m.get(&coin("bitcoin")).unwrap();
        assert!((btc.values()[0] - 0.21).abs() < 1e-12);
        assert!((btc.values()[1] - (110.0 / 121.0 - 1.0)).abs() < 1e-12);

        let eth = m.get(&coin("ethereum")).unwrap();
        assert!((eth.values()[0] - 0.2).abs() < 1e-12);
        assert!((eth.values()[1] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn non_positive_prices_skip_only_that_coin() {
        let alignment = align(vec![
            (coin("bitcoin"), series(&[(1, dec!(1)), (2, dec!(2)), (3, dec!(3))])),
            (coin("broken"), series(&[(1, dec!(1)), (2, dec!(0)), (3, dec!(3))])),
            (coin("ethereum"), series(&[(1, dec!(3)), (2, dec!(2)), (3, dec!(1))])),
        ]);

        assert_eq!(
            alignment.skipped,
            vec![SkippedCoin::new(coin("broken"), SkipReason::InvalidPrices)]
        );
        let coins: Vec<&str> = alignment.matrix.coins().map(CoinId::as_str).collect();
        assert_eq!(coins, vec!["bitcoin", "ethereum"]);
    }

    #[test]
    fn short_history_is_dropped_to_keep_the_rest() {
        // "newcoin" only overlaps the others on two days.
        let alignment = align(vec![
            (coin("bitcoin"), series(&[(1, dec!(1)), (2, dec!(2)), (3, dec!(3)), (4, dec!(4))])),
            (coin("newcoin"), series(&[(3, dec!(5)), (4, dec!(6)), (9, dec!(7))])),
            (coin("ethereum"), series(&[(1, dec!(4)), (2, dec!(3)), (3, dec!(2)), (4, dec!(1))])),
        ]);

        assert_eq!(
            alignment.skipped,
            vec![SkippedCoin::new(coin("newcoin"), SkipReason::InsufficientHistory)]
        );
        assert_eq!(alignment.matrix.len(), 2);
        assert_eq!(alignment.matrix.observations(), 3);
    }

    #[test]
    fn too_few_points_is_flagged_not_fatal() {
        let alignment = align(vec![
            (coin("bitcoin"), series(&[(1, dec!(1)), (2, dec!(2))])),
            (coin("empty"), PriceSeries::default()),
        ]);

        assert!(alignment.matrix.is_empty());
        assert_eq!(alignment.matrix.observations(), 0);
        assert_eq!(alignment.skipped.len(), 2);
        assert!(alignment.skipped.iter().all(|s| s.reason == SkipReason::InsufficientHistory));
    }

    #[test]
    fn disjoint_calendars_keep_the_first_requested_coin() {
        let alignment = align(vec![
            (coin("a"), series(&[(1, dec!(1)), (2, dec!(2)), (3, dec!(3))])),
            (coin("b"), series(&[(11, dec!(1)), (12, dec!(2)), (13, dec!(3))])),
        ]);

        let coins: Vec<&str> = alignment.matrix.coins().map(CoinId::as_str).collect();
        assert_eq!(coins, vec!["a"]);
        assert_eq!(alignment.skipped[0].coin, coin("b"));
    }

    #[test]
    fn single_coin_returns() {
        let returns = returns_of(
            coin("bitcoin"),
            series(&[(1, dec!(100)), (2, dec!(110)), (4, dec!(99))]),
        )
        .unwrap();
        assert_eq!(returns.dates(), &[day(2), day(4)]);

        let skipped = returns_of(coin("bitcoin"), series(&[(1, dec!(100)), (2, dec!(0)), (3, dec!(1))]));
        assert_eq!(
            skipped,
            Err(SkippedCoin::new(coin("bitcoin"), SkipReason::InvalidPrices))
        );
    }

    #[test]
    fn align_pair_matches_dates() {
        let a = ReturnSeries::new(coin("a"), vec![day(1), day(2), day(4), day(5)], vec![0.1, 0.2, 0.4, 0.5]).unwrap();
        let b = ReturnSeries::new(coin("b"), vec![day(2), day(3), day(5)], vec![-0.2, -0.3, -0.5]).unwrap();

        let paired = align_pair(&a, &b);
        assert_eq!(paired.dates, vec![day(2), day(5)]);
        assert_eq!(paired.a, vec![0.2, 0.5]);
        assert_eq!(paired.b, vec![-0.2, -0.5]);
    }
}
