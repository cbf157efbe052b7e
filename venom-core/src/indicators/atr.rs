//! True range and rolling averages.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).

use crate::domain::Bar;

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
/// TR[t] = max(high[t]-low[t], |high[t]-close[t-1]|, |low[t]-close[t-1]|).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = Vec::with_capacity(n);

    if n == 0 {
        return tr;
    }

    tr.push(bars[0].high - bars[0].low);

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr.push((h - l).max((h - pc).abs()).max((l - pc).abs()));
    }

    tr
}

/// Trailing simple mean over `period` values.
///
/// The output has `values.len() - period + 1` entries; entry `k` is the mean
/// of `values[k..k + period]`. Empty if the series is shorter than `period`.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    out.push(sum / period as f64);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / period as f64);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn true_range_first_bar_is_high_minus_low() {
        let bars = make_bars(&[100.0, 101.0], 0.5);
        let tr = true_range(&bars);
        assert_approx(tr[0], 1.0, 1e-12);
    }

    #[test]
    fn true_range_uses_previous_close_on_gap() {
        let mut bars = make_bars(&[100.0, 100.0], 0.5);
        // Gap up: bar 1 trades entirely above the previous close.
        bars[1].low = 103.0;
        bars[1].high = 104.0;
        bars[1].open = 103.5;
        bars[1].close = 103.5;
        let tr = true_range(&bars);
        assert_approx(tr[1], 4.0, 1e-12);
    }

    #[test]
    fn true_range_empty() {
        assert!(true_range(&[]).is_empty());
    }

    #[test]
    fn rolling_mean_basic() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out.len(), 3);
        assert_approx(out[0], 2.0, 1e-12);
        assert_approx(out[1], 3.0, 1e-12);
        assert_approx(out[2], 4.0, 1e-12);
    }

    #[test]
    fn rolling_mean_short_input() {
        assert!(rolling_mean(&[1.0, 2.0], 3).is_empty());
        assert!(rolling_mean(&[1.0, 2.0], 0).is_empty());
    }
}
