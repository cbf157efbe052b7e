//! Timeframe classifier.
//!
//! Picks the holding-duration bucket for a setup and the position-size
//! multiplier that goes with it. Bucket rules are checked in priority order
//! and the first match wins:
//!
//! 1. strong trend strength → long
//! 2. very high volatility percentile → long
//! 3. breakout-pending with a high break probability → medium
//! 4. low-liquidity session → medium
//! 5. otherwise → short

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::Session;
use crate::structure::{MarketStructure, Regime};

/// Expected holding-duration bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeBucket {
    Short,
    Medium,
    Long,
}

impl TimeframeBucket {
    pub const ALL: [TimeframeBucket; 3] = [
        TimeframeBucket::Short,
        TimeframeBucket::Medium,
        TimeframeBucket::Long,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeframeBucket::Short => "short",
            TimeframeBucket::Medium => "medium",
            TimeframeBucket::Long => "long",
        }
    }
}

impl fmt::Display for TimeframeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which rule selected the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketReason {
    StrongTrend,
    HighVolatility,
    BreakoutBuilding,
    LowLiquidity,
    Default,
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeframeChoice {
    pub bucket: TimeframeBucket,
    pub reason: BucketReason,
    pub size_multiplier: f64,
}

fn select_bucket(
    structure: &MarketStructure,
    session: Option<Session>,
    config: &EngineConfig,
) -> (TimeframeBucket, BucketReason) {
    let tf = &config.timeframe;
    if structure.trend_strength.abs() >= tf.strong_trend {
        return (TimeframeBucket::Long, BucketReason::StrongTrend);
    }
    if structure.volatility_percentile >= tf.high_vol_percentile {
        return (TimeframeBucket::Long, BucketReason::HighVolatility);
    }
    if structure.regime == Regime::BreakoutPending
        && structure.structure_break_probability >= tf.breakout_break_prob
    {
        return (TimeframeBucket::Medium, BucketReason::BreakoutBuilding);
    }
    if session.is_some_and(|s| config.sessions.is_low_liquidity(s)) {
        return (TimeframeBucket::Medium, BucketReason::LowLiquidity);
    }
    (TimeframeBucket::Short, BucketReason::Default)
}

/// Position-size multiplier from regime, break probability and session,
/// clamped to `[min_multiplier, max_multiplier]`.
pub fn position_size_multiplier(
    structure: &MarketStructure,
    session: Option<Session>,
    config: &EngineConfig,
) -> f64 {
    let sizing = &config.sizing;
    let regime = sizing.regime_factors.factor(structure.regime);
    let conviction = 1.0 + sizing.break_prob_weight * (structure.structure_break_probability - 0.5);
    let liquidity = match session {
        Some(s) if config.sessions.is_low_liquidity(s) => sizing.low_liquidity_factor,
        _ => 1.0,
    };
    let raw = regime * conviction * liquidity;
    if !raw.is_finite() {
        return sizing.min_multiplier;
    }
    raw.clamp(sizing.min_multiplier, sizing.max_multiplier)
}

/// Classify a setup into a holding bucket and compute its size multiplier.
pub fn classify(
    structure: &MarketStructure,
    session: Option<Session>,
    config: &EngineConfig,
) -> TimeframeChoice {
    let (bucket, reason) = select_bucket(structure, session, config);
    TimeframeChoice {
        bucket,
        reason,
        size_multiplier: position_size_multiplier(structure, session, config),
    }
}
