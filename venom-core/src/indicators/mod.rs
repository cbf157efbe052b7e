//! Numeric building blocks shared by the analyzer and scorer.
//!
//! Everything here is a pure function of its slice input. Divisions go
//! through [`stats::safe_div`] so degenerate windows (flat prices, zero
//! volume) produce neutral values rather than NaN.

pub mod atr;
pub mod stats;

pub use atr::{rolling_mean, true_range};
pub use stats::{linear_regression, mean, percentile, percentile_rank, safe_div, Regression};

/// Create synthetic hourly bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + spread, low = min(open,close) - spread, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64], spread: f64) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + spread,
                low: open.min(close) - spread,
                close,
                volume: 1000.0,
                session: None,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}
