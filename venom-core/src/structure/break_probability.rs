//! Structure-break probability.
//!
//! A weighted sum of four components, each in [0, 1]:
//!
//! - **proximity**: how close price sits to the nearer of support/resistance
//! - **volume**: short-window volume surge over the longer baseline
//! - **momentum**: magnitude of the short-window close-to-close move
//! - **regime**: a fixed bonus per regime ([`Regime::break_bonus`])
//!
//! The sum is clipped to `[break_prob_min, break_prob_max]`.

use crate::config::StructureConfig;
use crate::indicators::{mean, safe_div};

use super::Regime;

/// Proximity component: 1 at a level, falling linearly to 0 at `proximity_scale`.
pub fn proximity_score(price: f64, support: f64, resistance: f64, cfg: &StructureConfig) -> f64 {
    let nearer = (price - support).abs().min((resistance - price).abs());
    let distance = safe_div(nearer, price, 1.0);
    (1.0 - safe_div(distance, cfg.proximity_scale, 1.0)).clamp(0.0, 1.0)
}

/// Volume component: 0 at or below the baseline, 1 at double the baseline.
pub fn volume_score(volumes: &[f64], cfg: &StructureConfig) -> f64 {
    let n = volumes.len();
    if n == 0 {
        return 0.0;
    }
    let short = mean(&volumes[n.saturating_sub(cfg.volume_short_window)..]);
    let long = mean(&volumes[n.saturating_sub(cfg.volume_long_window)..]);
    let ratio = safe_div(short, long, 1.0);
    (ratio - 1.0).clamp(0.0, 1.0)
}

/// Momentum component: |close change over `momentum_window`| / `momentum_scale`.
pub fn momentum_score(closes: &[f64], cfg: &StructureConfig) -> f64 {
    let n = closes.len();
    if n <= cfg.momentum_window {
        return 0.0;
    }
    let past = closes[n - 1 - cfg.momentum_window];
    let change = safe_div(closes[n - 1] - past, past, 0.0).abs();
    safe_div(change, cfg.momentum_scale, 0.0).clamp(0.0, 1.0)
}

/// Combine the four components into a clipped probability.
pub fn structure_break_probability(
    price: f64,
    support: f64,
    resistance: f64,
    closes: &[f64],
    volumes: &[f64],
    regime: Regime,
    cfg: &StructureConfig,
) -> f64 {
    let w = &cfg.break_weights;
    let raw = w.proximity * proximity_score(price, support, resistance, cfg)
        + w.volume * volume_score(volumes, cfg)
        + w.momentum * momentum_score(closes, cfg)
        + w.regime * regime.break_bonus();

    if !raw.is_finite() {
        return 0.5 * (cfg.break_prob_min + cfg.break_prob_max);
    }
    raw.clamp(cfg.break_prob_min, cfg.break_prob_max)
}
