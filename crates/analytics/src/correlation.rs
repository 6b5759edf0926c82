use crate::aligner::{AlignedReturnMatrix, align_pair};
use crate::stats::pearson;
use core_types::CoinId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Square, symmetric coin × coin table of Pearson coefficients.
///
/// A `None` cell means the coefficient is undefined (zero variance or too few
/// overlapping observations). The diagonal is always exactly `1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationMatrix(IndexMap<CoinId, IndexMap<CoinId, Option<f64>>>);

impl CorrelationMatrix {
    pub fn get(&self, a: &CoinId, b: &CoinId) -> Option<f64> {
        self.0.get(a)?.get(b).copied().flatten()
    }

    pub fn coins(&self) -> impl Iterator<Item = &CoinId> {
        self.0.keys()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&CoinId, &IndexMap<CoinId, Option<f64>>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Computes every pairwise coefficient of the aligned returns.
///
/// Each pair is re-intersected on its own dates rather than trusting a single
/// global calendar, and only the upper triangle is computed; the lower one is
/// mirrored so the result is symmetric bit for bit.
pub fn correlation_matrix(returns: &AlignedReturnMatrix) -> CorrelationMatrix {
    let series = returns.series();
    let n = series.len();
    let mut cells: Vec<Vec<Option<f64>>> = vec![vec![None; n]; n];

    for i in 0..n {
        cells[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let pair = align_pair(&series[i], &series[j]);
            let r = pearson(&pair.a, &pair.b);
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    let matrix = series
        .iter()
        .zip(cells)
        .map(|(row_series, row)| {
            let row = series
                .iter()
                .map(|s| s.coin().clone())
                .zip(row)
                .collect::<IndexMap<_, _>>();
            (row_series.coin().clone(), row)
        })
        .collect();

    CorrelationMatrix(matrix)
}
