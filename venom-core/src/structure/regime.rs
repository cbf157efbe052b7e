//! Regime classification, trend metrics and the volatility percentile.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StructureConfig;
use crate::domain::Bar;
use crate::indicators::{linear_regression, mean, percentile_rank, rolling_mean, safe_div, true_range};

/// Qualitative market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
    BreakoutPending,
    HighVolatility,
    LowVolatility,
}

impl Regime {
    pub const ALL: [Regime; 6] = [
        Regime::TrendingUp,
        Regime::TrendingDown,
        Regime::Ranging,
        Regime::BreakoutPending,
        Regime::HighVolatility,
        Regime::LowVolatility,
    ];

    pub fn is_trending(&self) -> bool {
        matches!(self, Regime::TrendingUp | Regime::TrendingDown)
    }

    /// Regime component of the structure-break probability, in [0, 1].
    pub fn break_bonus(&self) -> f64 {
        match self {
            Regime::BreakoutPending => 1.0,
            Regime::HighVolatility => 0.6,
            Regime::TrendingUp | Regime::TrendingDown => 0.4,
            Regime::Ranging => 0.2,
            Regime::LowVolatility => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Regime::TrendingUp => "trending_up",
            Regime::TrendingDown => "trending_down",
            Regime::Ranging => "ranging",
            Regime::BreakoutPending => "breakout_pending",
            Regime::HighVolatility => "high_volatility",
            Regime::LowVolatility => "low_volatility",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Least-squares trend summary of a close series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendMetrics {
    /// Regression slope per bar as a fraction of the mean close.
    pub slope_fraction: f64,
    /// Signed strength in [-1, 1]: saturated slope scaled by R².
    pub strength: f64,
    pub r_squared: f64,
}

/// Fit a line through the closes and normalise its slope by mean price.
pub fn trend_metrics(closes: &[f64], cfg: &StructureConfig) -> TrendMetrics {
    let fit = linear_regression(closes);
    let slope_fraction = safe_div(fit.slope, mean(closes), 0.0);
    let saturated = safe_div(slope_fraction.abs(), cfg.trend_saturation, 0.0).min(1.0);
    let strength = (slope_fraction.signum() * saturated * fit.r_squared).clamp(-1.0, 1.0);
    TrendMetrics {
        slope_fraction,
        strength: if slope_fraction == 0.0 { 0.0 } else { strength },
        r_squared: fit.r_squared,
    }
}

/// Percentile rank of the latest rolling average true range among all
/// rolling values in the window.
pub fn volatility_percentile(window: &[Bar], cfg: &StructureConfig) -> f64 {
    let tr = true_range(window);
    let atr = rolling_mean(&tr, cfg.vol_window);
    match atr.last() {
        Some(&current) => percentile_rank(&atr, current, cfg.vol_tie_tolerance),
        None => 50.0,
    }
}

/// Regime decision, short-circuiting in priority order: volatility
/// extremes, then trend slope, then range width.
pub fn classify_regime(
    volatility_percentile: f64,
    slope_fraction: f64,
    range_width_fraction: f64,
    cfg: &StructureConfig,
) -> Regime {
    if volatility_percentile >= cfg.high_vol_percentile {
        return Regime::HighVolatility;
    }
    if volatility_percentile <= cfg.low_vol_percentile {
        return Regime::LowVolatility;
    }
    if slope_fraction.abs() >= cfg.trend_slope_threshold {
        return if slope_fraction > 0.0 {
            Regime::TrendingUp
        } else {
            Regime::TrendingDown
        };
    }
    if range_width_fraction <= cfg.range_width_threshold {
        return Regime::Ranging;
    }
    Regime::BreakoutPending
}
