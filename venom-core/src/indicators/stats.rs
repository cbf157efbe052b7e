//! Descriptive statistics over price slices.

/// Values closer to zero than this are treated as zero in divisions.
pub const EPSILON: f64 = 1e-12;

/// `num / den`, or `fallback` when the denominator is near zero or the
/// result is not finite.
pub fn safe_div(num: f64, den: f64, fallback: f64) -> f64 {
    if den.abs() <= EPSILON {
        return fallback;
    }
    let out = num / den;
    if out.is_finite() {
        out
    } else {
        fallback
    }
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear-interpolated percentile (`pct` in [0, 100]) of the values.
///
/// Returns `None` for an empty slice.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile rank (0–100) of `value` within `population`, mid-rank for ties.
///
/// Values within `rel_tol * |value|` of `value` count as ties, so flat or
/// slowly drifting series rank near 50 instead of flipping on small
/// differences. An empty population ranks at 50.
pub fn percentile_rank(population: &[f64], value: f64, rel_tol: f64) -> f64 {
    if population.is_empty() {
        return 50.0;
    }
    let tol = (rel_tol.max(0.0) * value.abs()).max(EPSILON);
    let mut below = 0usize;
    let mut equal = 0usize;
    for &v in population {
        if (v - value).abs() <= tol {
            equal += 1;
        } else if v < value {
            below += 1;
        }
    }
    100.0 * (below as f64 + 0.5 * equal as f64) / population.len() as f64
}

/// Ordinary least-squares fit of `y` against its index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    /// Change in `y` per step.
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination in [0, 1]; 0 when `y` is constant.
    pub r_squared: f64,
}

/// Fit `y[i] = intercept + slope * i`. Fewer than two points yield a flat fit.
pub fn linear_regression(y: &[f64]) -> Regression {
    let n = y.len();
    if n < 2 {
        return Regression {
            slope: 0.0,
            intercept: y.first().copied().unwrap_or(0.0),
            r_squared: 0.0,
        };
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = yi - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = safe_div(sxy, sxx, 0.0);
    let r_squared = safe_div(sxy * sxy, sxx * syy, 0.0).clamp(0.0, 1.0);

    Regression {
        slope,
        intercept: y_mean - slope * x_mean,
        r_squared,
    }
}
