//! Structure analyzer: maps a bar window to a [`MarketStructure`] snapshot.
//!
//! The analyzer is a pure function of its input window: no caches, no
//! cross-call state. Identical windows always produce identical snapshots,
//! which keeps repeated runs and backtests deterministic.

pub mod break_probability;
pub mod regime;
pub mod zones;

use serde::{Deserialize, Serialize};

use crate::config::StructureConfig;
use crate::domain::Bar;
use crate::indicators::{percentile, safe_div};

pub use break_probability::structure_break_probability;
pub use regime::{classify_regime, trend_metrics, volatility_percentile, Regime, TrendMetrics};
pub use zones::liquidity_zones;

/// Snapshot of market structure for one window. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStructure {
    pub regime: Regime,
    pub support: f64,
    pub resistance: f64,
    /// Lowest low of the last `swing_window` bars.
    pub swing_low: f64,
    /// Highest high of the last `swing_window` bars.
    pub swing_high: f64,
    /// Signed trend strength in [-1, 1]; positive for up-trends.
    pub trend_strength: f64,
    /// Percentile (0–100) of current volatility within the window.
    pub volatility_percentile: f64,
    /// Liquidity-zone prices, ascending, without duplicates.
    pub liquidity_zones: Vec<f64>,
    /// Probability in [break_prob_min, break_prob_max] that price breaks
    /// the nearer structural level.
    pub structure_break_probability: f64,
    /// Number of bars the snapshot was computed from.
    pub bars_analyzed: usize,
    /// True when the window was too short (or unusable) and this is the
    /// neutral default.
    pub is_default: bool,
}

impl MarketStructure {
    /// The documented default for windows below `min_bars`.
    ///
    /// Support and resistance bracket the reference price by
    /// `default_band` on either side, the regime is ranging with no trend,
    /// volatility sits at the 50th percentile and the break probability at
    /// mid-range. Swing levels coincide with support and resistance.
    /// Without a usable reference price every level is zero.
    pub fn neutral(reference_price: Option<f64>, bars: usize, cfg: &StructureConfig) -> Self {
        let price = reference_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(0.0);
        let mid = 0.5 * (cfg.break_prob_min + cfg.break_prob_max);
        let support = price * (1.0 - cfg.default_band);
        let resistance = price * (1.0 + cfg.default_band);
        Self {
            regime: Regime::Ranging,
            support,
            resistance,
            swing_low: support,
            swing_high: resistance,
            trend_strength: 0.0,
            volatility_percentile: 50.0,
            liquidity_zones: Vec::new(),
            structure_break_probability: mid,
            bars_analyzed: bars,
            is_default: true,
        }
    }

    /// Resistance minus support.
    pub fn range_width(&self) -> f64 {
        self.resistance - self.support
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.support + self.resistance)
    }

    /// Where `price` sits in the support→resistance band (0 at support,
    /// 1 at resistance). `None` if the band is degenerate.
    pub fn position_in_range(&self, price: f64) -> Option<f64> {
        let width = self.range_width();
        if width <= crate::indicators::stats::EPSILON {
            return None;
        }
        Some((price - self.support) / width)
    }

    /// Distance from `price` to the nearest liquidity zone as a fraction of
    /// price. `None` if there are no zones or the price is unusable.
    pub fn nearest_zone_distance(&self, price: f64) -> Option<f64> {
        if price <= 0.0 || !price.is_finite() {
            return None;
        }
        self.liquidity_zones
            .iter()
            .map(|z| (z - price).abs() / price)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Analyze a window of bars.
///
/// Never fails: windows shorter than `cfg.min_bars`, or containing void /
/// insane bars, get [`MarketStructure::neutral`].
pub fn analyze(window: &[Bar], cfg: &StructureConfig) -> MarketStructure {
    let reference = window.last().map(|b| b.close);

    if window.len() < cfg.min_bars {
        tracing::trace!(
            bars = window.len(),
            min_bars = cfg.min_bars,
            "window below minimum, using default structure"
        );
        return MarketStructure::neutral(reference, window.len(), cfg);
    }
    if let Some(bad) = window.iter().find(|b| !b.is_sane()) {
        tracing::debug!(timestamp = %bad.timestamp, "window contains an unusable bar, using default structure");
        return MarketStructure::neutral(None, window.len(), cfg);
    }

    let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = window.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = window.iter().map(|b| b.low).collect();
    let volumes: Vec<f64> = window.iter().map(|b| b.volume).collect();
    let price = closes[closes.len() - 1];

    // Non-empty by the min_bars check above.
    let support = percentile(&lows, cfg.support_percentile).unwrap_or(price);
    let resistance = percentile(&highs, cfg.resistance_percentile).unwrap_or(price);
    let recent = window.len().saturating_sub(cfg.swing_window);
    let swing_low = lows[recent..].iter().copied().fold(f64::INFINITY, f64::min);
    let swing_high = highs[recent..].iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let vol_pct = volatility_percentile(window, cfg);
    let trend = trend_metrics(&closes, cfg);
    let width = safe_div(resistance - support, price, 0.0);
    let regime = classify_regime(vol_pct, trend.slope_fraction, width, cfg);

    let zones = liquidity_zones(&highs, &lows, cfg.zone_half_width);
    let break_prob = structure_break_probability(
        price,
        support,
        resistance,
        &closes,
        &volumes,
        regime,
        cfg,
    );

    MarketStructure {
        regime,
        support,
        resistance,
        swing_low,
        swing_high,
        trend_strength: trend.strength,
        volatility_percentile: vol_pct,
        liquidity_zones: zones,
        structure_break_probability: break_prob,
        bars_analyzed: window.len(),
        is_default: false,
    }
}
