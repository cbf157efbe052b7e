//! Level calculator: entry, stop, targets and invalidation for a setup.
//!
//! The stop distance is the larger of a fixed fractional stop (per bucket)
//! and a structural stop placed just beyond the nearest structural level on
//! the losing side: support or the recent swing low for buys, resistance or
//! the recent swing high for sells. Setups whose risk is non-positive, exceeds the safety ceiling,
//! or whose reward:risk falls outside the bucket band are rejected with
//! `None`.

use serde::{Deserialize, Serialize};

use crate::config::{BucketProfile, LevelsConfig};
use crate::domain::Direction;
use crate::indicators::safe_div;
use crate::structure::MarketStructure;

/// Which policy set the stop distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSource {
    Fixed,
    Structural,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop: f64,
    pub target1: f64,
    pub target2: f64,
    /// Entry-to-stop distance, always positive.
    pub risk: f64,
    /// Reward to `target1` divided by risk.
    pub risk_reward: f64,
    /// Monitoring price just beyond the stop.
    pub invalidation: f64,
    pub stop_source: StopSource,
}

/// Nearest structural level strictly below (buys) or above (sells) `price`.
fn stop_anchor(direction: Direction, structure: &MarketStructure, price: f64) -> Option<f64> {
    let candidates = match direction {
        Direction::Buy => [structure.support, structure.swing_low],
        Direction::Sell => [structure.resistance, structure.swing_high],
    };
    let usable = candidates.into_iter().filter(|l| l.is_finite() && *l > 0.0);
    match direction {
        Direction::Buy => usable.filter(|l| *l < price).max_by(f64::total_cmp),
        Direction::Sell => usable.filter(|l| *l > price).min_by(f64::total_cmp),
    }
}

/// Distance from `price` to a stop just beyond the nearest structural level,
/// or `None` if no level sits on the losing side of price.
fn structural_distance(
    direction: Direction,
    structure: &MarketStructure,
    price: f64,
    buffer: f64,
) -> Option<f64> {
    let anchor = stop_anchor(direction, structure, price)?;
    let distance = match direction {
        Direction::Buy => price - anchor * (1.0 - buffer),
        Direction::Sell => anchor * (1.0 + buffer) - price,
    };
    (distance.is_finite() && distance > 0.0).then_some(distance)
}

/// Compute trade levels, or `None` if the setup fails a rejection rule.
pub fn calculate_levels(
    direction: Direction,
    structure: &MarketStructure,
    price: f64,
    profile: &BucketProfile,
    cfg: &LevelsConfig,
) -> Option<TradeLevels> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }

    let fixed = price * profile.stop_fraction;
    let (risk, stop_source) = match structural_distance(direction, structure, price, cfg.structure_buffer) {
        Some(s) if s > fixed => (s, StopSource::Structural),
        _ => (fixed, StopSource::Fixed),
    };

    if !risk.is_finite() || risk <= 0.0 {
        tracing::trace!(risk, "rejecting setup: non-positive risk");
        return None;
    }
    let risk_fraction = safe_div(risk, price, f64::INFINITY);
    if risk_fraction > cfg.max_risk_fraction {
        tracing::debug!(
            risk_fraction,
            ceiling = cfg.max_risk_fraction,
            "rejecting setup: risk above ceiling"
        );
        return None;
    }

    let sign = direction.sign();
    let entry = price;
    let stop = entry - sign * risk;
    let target1 = entry + sign * risk * profile.target_ratio;
    let target2 = entry + sign * risk * (profile.target_ratio + cfg.target_stretch);
    let risk_reward = safe_div((target1 - entry).abs(), (entry - stop).abs(), 0.0);

    if !profile.accepts(risk_reward) {
        tracing::debug!(
            risk_reward,
            min = profile.min_rr,
            max = profile.max_rr,
            "rejecting setup: reward:risk outside bucket band"
        );
        return None;
    }
    if stop <= 0.0 {
        return None;
    }

    Some(TradeLevels {
        entry,
        stop,
        target1,
        target2,
        risk: (entry - stop).abs(),
        risk_reward,
        invalidation: stop - sign * risk * cfg.invalidation_buffer,
        stop_source,
    })
}
