//! Signal: the immutable trade setup emitted by the engine.
//!
//! A signal is created once per qualifying analysis cycle and consumed exactly
//! once, either by external delivery or by the backtest resolver. It carries
//! everything needed to act on or resolve the setup without re-running the
//! analysis.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Session;
use crate::structure::Regime;
use crate::timeframe::TimeframeBucket;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1.0 for buys, -1.0 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => f.write_str("BUY"),
            Direction::Sell => f.write_str("SELL"),
        }
    }
}

/// Coarse confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthTier {
    Weak,
    Moderate,
    Strong,
    Extreme,
}

impl StrengthTier {
    /// Confidence cut-points: below 60 weak, below 75 moderate, below 85 strong.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 85.0 {
            StrengthTier::Extreme
        } else if confidence >= 75.0 {
            StrengthTier::Strong
        } else if confidence >= 60.0 {
            StrengthTier::Moderate
        } else {
            StrengthTier::Weak
        }
    }
}

/// A fully specified trade setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    /// Confidence in `[scoring.min_confidence, 100]`.
    pub confidence: f64,
    pub strength: StrengthTier,
    pub entry: f64,
    pub stop: f64,
    pub target1: f64,
    pub target2: f64,
    /// Reward to risk of the first target.
    pub risk_reward: f64,
    pub position_size_multiplier: f64,
    pub regime: Regime,
    pub timeframe: TimeframeBucket,
    /// Expected holding period, in bars of the input series.
    pub expected_bars: usize,
    pub rationale: String,
    /// Price beyond the stop at which the setup is void (monitoring only).
    pub invalidation: f64,
    pub session: Session,
    /// Timestamp of the latest bar in the analysed window.
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// Entry-to-stop distance.
    pub fn risk(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    /// Entry-to-first-target distance.
    pub fn reward(&self) -> f64 {
        (self.target1 - self.entry).abs()
    }

    /// Expected holding period as wall-clock time for a given bar interval.
    ///
    /// Saturates at the largest representable duration.
    pub fn expected_duration(&self, bar_interval: Duration) -> Duration {
        let bars = i64::try_from(self.expected_bars).unwrap_or(i64::MAX);
        let millis = bar_interval
            .num_milliseconds()
            .saturating_mul(bars)
            .max(-i64::MAX);
        Duration::milliseconds(millis)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {:.5} | SL {:.5} | TP1 {:.5} | TP2 {:.5} | RR 1:{:.2} | conf {:.1} ({:?}) | {:?}/{:?}",
            self.symbol,
            self.direction,
            self.entry,
            self.stop,
            self.target1,
            self.target2,
            self.risk_reward,
            self.confidence,
            self.strength,
            self.regime,
            self.timeframe,
        )
    }
}
