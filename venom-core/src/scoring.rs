//! Direction & confidence scorer.
//!
//! Starts from a base confidence and layers on a regime-dependent directional
//! bias, a structure-break contribution, a capped trend-strength
//! contribution, a volatility sweet-spot bonus, a liquidity-zone bonus and
//! an optional session multiplier. The result is clamped to
//! `[min_confidence, max_confidence]`.
//!
//! When no regime branch establishes a direction the scorer returns `None`.
//! That is the normal "no signal" outcome, not an error.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::{Direction, Session};
use crate::structure::{MarketStructure, Regime};

/// Lower boundary of the neutral middle third of a range.
const LOWER_THIRD: f64 = 1.0 / 3.0;
/// Upper boundary of the neutral middle third of a range.
const UPPER_THIRD: f64 = 2.0 / 3.0;

/// Why the scorer picked a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasReason {
    TrendContinuation,
    RangeReversionFromSupport,
    RangeReversionFromResistance,
    BreakoutAboveMidpoint,
    BreakoutBelowMidpoint,
    VolatilityWithTrend,
}

impl BiasReason {
    pub fn describe(&self) -> &'static str {
        match self {
            BiasReason::TrendContinuation => "trend continuation",
            BiasReason::RangeReversionFromSupport => "mean reversion off range support",
            BiasReason::RangeReversionFromResistance => "mean reversion off range resistance",
            BiasReason::BreakoutAboveMidpoint => "breakout bias above band midpoint",
            BiasReason::BreakoutBelowMidpoint => "breakout bias below band midpoint",
            BiasReason::VolatilityWithTrend => "volatility regime with underlying trend",
        }
    }
}

/// Per-term contributions, kept for the signal rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub bias: f64,
    pub break_probability: f64,
    pub trend_strength: f64,
    pub volatility_sweet_spot: f64,
    pub liquidity_zone: f64,
    pub session_multiplier: f64,
    /// Confidence before clamping.
    pub raw: f64,
}

/// A directional score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub direction: Direction,
    pub confidence: f64,
    pub reason: BiasReason,
    pub breakdown: ScoreBreakdown,
}

/// Regime-dependent direction and bias bonus, or `None` for no bias.
pub fn directional_bias(
    structure: &MarketStructure,
    price: f64,
    config: &EngineConfig,
) -> Option<(Direction, f64, BiasReason)> {
    let cfg = &config.scoring;
    match structure.regime {
        Regime::TrendingUp => Some((Direction::Buy, cfg.trend_bias, BiasReason::TrendContinuation)),
        Regime::TrendingDown => {
            Some((Direction::Sell, cfg.trend_bias, BiasReason::TrendContinuation))
        }
        Regime::Ranging => {
            let pos = structure.position_in_range(price)?;
            if pos <= LOWER_THIRD {
                Some((Direction::Buy, cfg.range_bias, BiasReason::RangeReversionFromSupport))
            } else if pos >= UPPER_THIRD {
                Some((
                    Direction::Sell,
                    cfg.range_bias,
                    BiasReason::RangeReversionFromResistance,
                ))
            } else {
                None
            }
        }
        Regime::BreakoutPending => {
            let mid = structure.midpoint();
            if price > mid {
                Some((Direction::Buy, cfg.breakout_bias, BiasReason::BreakoutAboveMidpoint))
            } else if price < mid {
                Some((Direction::Sell, cfg.breakout_bias, BiasReason::BreakoutBelowMidpoint))
            } else {
                None
            }
        }
        Regime::HighVolatility | Regime::LowVolatility => {
            if structure.trend_strength.abs() < cfg.volatility_min_trend
                || structure.trend_strength == 0.0
            {
                return None;
            }
            let direction = if structure.trend_strength > 0.0 {
                Direction::Buy
            } else {
                Direction::Sell
            };
            Some((direction, cfg.volatility_bias, BiasReason::VolatilityWithTrend))
        }
    }
}

/// Score a structure snapshot at the current price.
///
/// `session` applies the configured confidence multiplier when
/// `apply_session_multiplier` is set; `None` leaves confidence unscaled.
pub fn score(
    structure: &MarketStructure,
    price: f64,
    session: Option<Session>,
    config: &EngineConfig,
) -> Option<Score> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }

    let Some((direction, bias, reason)) = directional_bias(structure, price, config) else {
        tracing::trace!(regime = %structure.regime, price, "no directional bias");
        return None;
    };

    let cfg = &config.scoring;
    let break_probability = structure.structure_break_probability * cfg.break_prob_weight;
    let trend_strength =
        (structure.trend_strength.abs() * cfg.trend_strength_weight).min(cfg.trend_strength_cap);
    let vol = structure.volatility_percentile;
    let volatility_sweet_spot = if vol >= cfg.vol_sweet_spot_low && vol <= cfg.vol_sweet_spot_high
    {
        cfg.vol_sweet_spot_bonus
    } else {
        0.0
    };
    let liquidity_zone = match structure.nearest_zone_distance(price) {
        Some(d) if d <= cfg.zone_proximity => cfg.zone_bonus,
        _ => 0.0,
    };
    let session_multiplier = match session {
        Some(s) if cfg.apply_session_multiplier => config.sessions.multiplier(s),
        _ => 1.0,
    };

    let raw = (cfg.base_confidence
        + bias
        + break_probability
        + trend_strength
        + volatility_sweet_spot
        + liquidity_zone)
        * session_multiplier;
    let confidence = if raw.is_finite() {
        raw.clamp(cfg.min_confidence, cfg.max_confidence)
    } else {
        cfg.min_confidence
    };

    Some(Score {
        direction,
        confidence,
        reason,
        breakdown: ScoreBreakdown {
            base: cfg.base_confidence,
            bias,
            break_probability,
            trend_strength,
            volatility_sweet_spot,
            liquidity_zone,
            session_multiplier,
            raw,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    fn structure(regime: Regime) -> MarketStructure {
        MarketStructure {
            regime,
            support: 90.0,
            resistance: 120.0,
            swing_low: 90.0,
            swing_high: 120.0,
            trend_strength: 0.0,
            volatility_percentile: 50.0,
            liquidity_zones: Vec::new(),
            structure_break_probability: 0.5,
            bars_analyzed: 50,
            is_default: false,
        }
    }

    #[test]
    fn trending_follows_trend() {
        let cfg = EngineConfig::default();
        let up = score(&structure(Regime::TrendingUp), 100.0, None, &cfg).unwrap();
        assert_eq!(up.direction, Direction::Buy);
        assert_eq!(up.reason, BiasReason::TrendContinuation);
        let down = score(&structure(Regime::TrendingDown), 100.0, None, &cfg).unwrap();
        assert_eq!(down.direction, Direction::Sell);
    }

    #[test]
    fn ranging_reverts_at_edges_and_abstains_in_middle() {
        let cfg = EngineConfig::default();
        let s = structure(Regime::Ranging);
        // band 90..120: lower third ends at 100, upper third starts at 110
        assert_eq!(score(&s, 95.0, None, &cfg).unwrap().direction, Direction::Buy);
        assert_eq!(score(&s, 115.0, None, &cfg).unwrap().direction, Direction::Sell);
        assert!(score(&s, 105.0, None, &cfg).is_none());
    }

    #[test]
    fn ranging_with_degenerate_band_has_no_bias() {
        let cfg = EngineConfig::default();
        let mut s = structure(Regime::Ranging);
        s.support = 100.0;
        s.resistance = 100.0;
        assert!(score(&s, 100.0, None, &cfg).is_none());
    }

    #[test]
    fn breakout_follows_side_of_midpoint() {
        let cfg = EngineConfig::default();
        let s = structure(Regime::BreakoutPending);
        assert_eq!(score(&s, 110.0, None, &cfg).unwrap().direction, Direction::Buy);
        assert_eq!(score(&s, 100.0, None, &cfg).unwrap().direction, Direction::Sell);
        assert!(score(&s, 105.0, None, &cfg).is_none());
    }

    #[test]
    fn volatility_regimes_need_a_trend() {
        let cfg = EngineConfig::default();
        let mut s = structure(Regime::HighVolatility);
        assert!(score(&s, 100.0, None, &cfg).is_none());
        s.trend_strength = -0.6;
        assert_eq!(score(&s, 100.0, None, &cfg).unwrap().direction, Direction::Sell);
    }

    #[test]
    fn confidence_components_add_up() {
        let cfg = EngineConfig::default();
        let mut s = structure(Regime::TrendingUp);
        s.trend_strength = 0.25; // 0.25 * 20 = 5, below cap
        s.liquidity_zones = vec![100.1];
        let sc = score(&s, 100.0, None, &cfg).unwrap();
        // 50 base + 12 bias + 7.5 break + 5 trend + 5 sweet spot + 5 zone
        assert_approx(sc.confidence, 84.5, 1e-9);
        assert_approx(sc.breakdown.trend_strength, 5.0, 1e-12);
        assert_approx(sc.breakdown.liquidity_zone, 5.0, 1e-12);
    }

    #[test]
    fn trend_contribution_is_capped() {
        let cfg = EngineConfig::default();
        let mut s = structure(Regime::TrendingUp);
        s.trend_strength = 1.0;
        let sc = score(&s, 100.0, None, &cfg).unwrap();
        assert_approx(sc.breakdown.trend_strength, cfg.scoring.trend_strength_cap, 1e-12);
    }

    #[test]
    fn confidence_clamped_to_bounds() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.base_confidence = 100.0;
        let sc = score(&structure(Regime::TrendingUp), 100.0, None, &cfg).unwrap();
        assert_approx(sc.confidence, cfg.scoring.max_confidence, 1e-12);

        cfg.scoring.base_confidence = 0.0;
        cfg.scoring.trend_bias = 0.0;
        cfg.scoring.break_prob_weight = 0.0;
        cfg.scoring.vol_sweet_spot_bonus = 0.0;
        let sc = score(&structure(Regime::TrendingUp), 100.0, None, &cfg).unwrap();
        assert_approx(sc.confidence, cfg.scoring.min_confidence, 1e-12);
    }

    #[test]
    fn session_multiplier_scales_confidence() {
        let cfg = EngineConfig::default();
        let s = structure(Regime::TrendingUp);
        let plain = score(&s, 100.0, None, &cfg).unwrap();
        let asian = score(&s, 100.0, Some(Session::Asian), &cfg).unwrap();
        assert_approx(asian.breakdown.session_multiplier, 0.9, 1e-12);
        assert!(asian.confidence < plain.confidence);
    }

    #[test]
    fn rejects_unusable_price() {
        let cfg = EngineConfig::default();
        assert!(score(&structure(Regime::TrendingUp), 0.0, None, &cfg).is_none());
        assert!(score(&structure(Regime::TrendingUp), f64::NAN, None, &cfg).is_none());
    }
}
