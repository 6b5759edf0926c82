//! Sample statistics over equal-length slices.

/// Sums of squared deviations at or below this are treated as zero variance.
/// Daily returns are O(1e-2), so genuine variation is many orders above it.
pub const VARIANCE_EPSILON: f64 = 1e-20;

/// Minimum number of paired observations for any statistic.
pub const MIN_OBSERVATIONS: usize = 2;

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Co-moment sums: (Σdx·dy, Σdx², Σdy²).
fn co_moments(x: &[f64], y: &[f64]) -> Option<(f64, f64, f64)> {
    if x.len() != y.len() || x.len() < MIN_OBSERVATIONS {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    Some((sxy, sxx, syy))
}

/// Sample (n-1) covariance.
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    let (sxy, _, _) = co_moments(x, y)?;
    Some(sxy / (x.len() - 1) as f64)
}

/// Sample (n-1) variance.
pub fn variance(x: &[f64]) -> Option<f64> {
    let (_, sxx, _) = co_moments(x, x)?;
    Some(sxx / (x.len() - 1) as f64)
}

/// Pearson correlation coefficient, clamped to [-1, 1].
///
/// `None` when there are fewer than two pairs or either side has zero
/// variance; the coefficient is undefined there, not zero.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let (sxy, sxx, syy) = co_moments(x, y)?;
    if sxx <= VARIANCE_EPSILON || syy <= VARIANCE_EPSILON {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Least-squares slope of `y` regressed on `x`: cov(x, y) / var(x).
pub fn slope(x: &[f64], y: &[f64]) -> Option<f64> {
    let (sxy, sxx, _) = co_moments(x, y)?;
    if sxx <= VARIANCE_EPSILON {
        return None;
    }
    let b = sxy / sxx;
    b.is_finite().then_some(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn sample_moments() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((mean(&x).unwrap() - 2.5).abs() < EPS);
        assert!((variance(&x).unwrap() - 5.0 / 3.0).abs() < EPS);
        assert!((covariance(&x, &y).unwrap() - 10.0 / 3.0).abs() < EPS);
    }

    #[test]
    fn pearson_extremes() {
        let x = [0.01, -0.02, 0.03, 0.005, -0.01];
        let neg: Vec<f64> = x.iter().map(|v| -v).collect();
        assert!((pearson(&x, &x).unwrap() - 1.0).abs() < EPS);
        assert!((pearson(&x, &neg).unwrap() + 1.0).abs() < EPS);
    }

    #[test]
    fn pearson_undefined_cases() {
        assert_eq!(pearson(&[0.0, 0.0, 0.0], &[0.1, 0.2, 0.3]), None);
        assert_eq!(pearson(&[0.1], &[0.2]), None);
        assert_eq!(pearson(&[0.1, 0.2], &[0.2]), None);
    }

    #[test]
    fn slope_recovers_linear_factor() {
        let x = [0.01, -0.02, 0.03, 0.005];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 0.001).collect();
        assert!((slope(&x, &y).unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(slope(&[0.5, 0.5, 0.5], &y[..3]), None);
    }
}
