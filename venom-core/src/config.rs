//! Engine configuration.
//!
//! Every threshold the analyzer, scorer, classifier and level calculator use
//! lives here. An `EngineConfig` is built once (defaults, TOML, or code),
//! validated, and then passed by reference into every call, so parallel
//! backtests with different settings never share mutable state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Session;
use crate::structure::Regime;
use crate::timeframe::TimeframeBucket;

// ─── Error type ──────────────────────────────────────────────────────

/// Errors from loading or validating an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {field} {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_range(field: &str, value: f64, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value >= lo && value <= hi) {
        return Err(invalid(field, format!("must be in [{lo}, {hi}], got {value}")));
    }
    Ok(())
}

fn check_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(field, format!("must be > 0, got {value}")));
    }
    Ok(())
}

// ─── Top level ───────────────────────────────────────────────────────

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub structure: StructureConfig,
    pub scoring: ScoringConfig,
    pub levels: LevelsConfig,
    pub timeframe: TimeframeConfig,
    pub sizing: SizingConfig,
    pub sessions: SessionConfig,
}

impl EngineConfig {
    /// Parse a TOML document and validate it. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check cross-field consistency of every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.structure.validate()?;
        self.scoring.validate()?;
        self.levels.validate()?;
        self.timeframe.validate()?;
        self.sizing.validate()?;
        self.sessions.validate()?;
        Ok(())
    }
}

// ─── Structure analyzer ──────────────────────────────────────────────

/// Weights of the four structure-break components. They need not sum to 1;
/// the weighted sum is clipped afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakWeights {
    pub proximity: f64,
    pub volume: f64,
    pub momentum: f64,
    pub regime: f64,
}

impl Default for BreakWeights {
    fn default() -> Self {
        Self {
            proximity: 0.35,
            volume: 0.25,
            momentum: 0.25,
            regime: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Windows shorter than this get the neutral default structure.
    pub min_bars: usize,
    /// Percentile of lows used as support.
    pub support_percentile: f64,
    /// Percentile of highs used as resistance.
    pub resistance_percentile: f64,
    /// Bars in the rolling average true range used for the volatility percentile.
    pub vol_window: usize,
    /// Relative difference under which two volatility readings rank as ties.
    pub vol_tie_tolerance: f64,
    /// Volatility percentile at or above which the regime is high-volatility.
    pub high_vol_percentile: f64,
    /// Volatility percentile at or below which the regime is low-volatility.
    pub low_vol_percentile: f64,
    /// Regression slope (fraction of mean price per bar) that counts as trending.
    pub trend_slope_threshold: f64,
    /// Slope at which trend strength saturates at 1.0.
    pub trend_saturation: f64,
    /// Support/resistance width (fraction of price) at or below which the
    /// market is ranging; wider non-trending bands are breakout-pending.
    pub range_width_threshold: f64,
    /// Neighbourhood half-width for liquidity-zone extrema.
    pub zone_half_width: usize,
    /// Trailing bars scanned for the most recent swing low/high.
    pub swing_window: usize,
    /// Distance (fraction of price) at which level proximity stops contributing.
    pub proximity_scale: f64,
    pub volume_short_window: usize,
    pub volume_long_window: usize,
    pub momentum_window: usize,
    /// Absolute momentum (fraction) that maps to a full momentum score.
    pub momentum_scale: f64,
    pub break_weights: BreakWeights,
    pub break_prob_min: f64,
    pub break_prob_max: f64,
    /// Half-width of the default support/resistance band for short windows.
    pub default_band: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            min_bars: 30,
            support_percentile: 10.0,
            resistance_percentile: 90.0,
            vol_window: 5,
            vol_tie_tolerance: 0.05,
            high_vol_percentile: 90.0,
            low_vol_percentile: 10.0,
            trend_slope_threshold: 0.0002,
            trend_saturation: 0.001,
            range_width_threshold: 0.02,
            zone_half_width: 3,
            swing_window: 10,
            proximity_scale: 0.02,
            volume_short_window: 5,
            volume_long_window: 20,
            momentum_window: 5,
            momentum_scale: 0.02,
            break_weights: BreakWeights::default(),
            break_prob_min: 0.05,
            break_prob_max: 0.95,
            default_band: 0.02,
        }
    }
}

impl StructureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_bars < 2 {
            return Err(invalid("structure.min_bars", "must be >= 2"));
        }
        check_range("structure.support_percentile", self.support_percentile, 0.0, 100.0)?;
        check_range(
            "structure.resistance_percentile",
            self.resistance_percentile,
            0.0,
            100.0,
        )?;
        if self.support_percentile >= self.resistance_percentile {
            return Err(invalid(
                "structure.support_percentile",
                "must be below resistance_percentile",
            ));
        }
        check_range("structure.low_vol_percentile", self.low_vol_percentile, 0.0, 100.0)?;
        check_range("structure.high_vol_percentile", self.high_vol_percentile, 0.0, 100.0)?;
        if self.low_vol_percentile >= self.high_vol_percentile {
            return Err(invalid(
                "structure.low_vol_percentile",
                "must be below high_vol_percentile",
            ));
        }
        for (field, window) in [
            ("structure.vol_window", self.vol_window),
            ("structure.zone_half_width", self.zone_half_width),
            ("structure.swing_window", self.swing_window),
            ("structure.volume_short_window", self.volume_short_window),
            ("structure.volume_long_window", self.volume_long_window),
            ("structure.momentum_window", self.momentum_window),
        ] {
            if window == 0 {
                return Err(invalid(field, "must be >= 1"));
            }
        }
        if self.volume_short_window > self.volume_long_window {
            return Err(invalid(
                "structure.volume_short_window",
                "must not exceed volume_long_window",
            ));
        }
        check_range("structure.vol_tie_tolerance", self.vol_tie_tolerance, 0.0, 1.0)?;
        check_positive("structure.trend_slope_threshold", self.trend_slope_threshold)?;
        check_positive("structure.trend_saturation", self.trend_saturation)?;
        check_positive("structure.range_width_threshold", self.range_width_threshold)?;
        check_positive("structure.proximity_scale", self.proximity_scale)?;
        check_positive("structure.momentum_scale", self.momentum_scale)?;
        check_positive("structure.default_band", self.default_band)?;
        let w = &self.break_weights;
        for (field, value) in [
            ("structure.break_weights.proximity", w.proximity),
            ("structure.break_weights.volume", w.volume),
            ("structure.break_weights.momentum", w.momentum),
            ("structure.break_weights.regime", w.regime),
        ] {
            check_range(field, value, 0.0, 1.0)?;
        }
        check_range("structure.break_prob_min", self.break_prob_min, 0.0, 1.0)?;
        check_range("structure.break_prob_max", self.break_prob_max, 0.0, 1.0)?;
        if self.break_prob_min > self.break_prob_max {
            return Err(invalid(
                "structure.break_prob_min",
                "must not exceed break_prob_max",
            ));
        }
        Ok(())
    }
}

// ─── Scorer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_confidence: f64,
    /// Bias bonus for trend continuation in trending regimes.
    pub trend_bias: f64,
    /// Bias bonus for mean reversion at the outer thirds of a range.
    pub range_bias: f64,
    /// Bias bonus for the breakout side in breakout-pending regimes.
    pub breakout_bias: f64,
    /// Bias bonus in volatility regimes when the trend is clear enough.
    pub volatility_bias: f64,
    /// Minimum |trend strength| for a direction in volatility regimes.
    pub volatility_min_trend: f64,
    /// Points added per unit of structure-break probability.
    pub break_prob_weight: f64,
    /// Points added per unit of |trend strength|, before the cap.
    pub trend_strength_weight: f64,
    pub trend_strength_cap: f64,
    pub vol_sweet_spot_low: f64,
    pub vol_sweet_spot_high: f64,
    pub vol_sweet_spot_bonus: f64,
    /// Distance to a liquidity zone (fraction of price) that earns the bonus.
    pub zone_proximity: f64,
    pub zone_bonus: f64,
    pub apply_session_multiplier: bool,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_confidence: 50.0,
            trend_bias: 12.0,
            range_bias: 10.0,
            breakout_bias: 8.0,
            volatility_bias: 5.0,
            volatility_min_trend: 0.15,
            break_prob_weight: 15.0,
            trend_strength_weight: 20.0,
            trend_strength_cap: 10.0,
            vol_sweet_spot_low: 30.0,
            vol_sweet_spot_high: 70.0,
            vol_sweet_spot_bonus: 5.0,
            zone_proximity: 0.003,
            zone_bonus: 5.0,
            apply_session_multiplier: true,
            min_confidence: 50.0,
            max_confidence: 95.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("scoring.min_confidence", self.min_confidence, 0.0, 100.0)?;
        check_range("scoring.max_confidence", self.max_confidence, 0.0, 100.0)?;
        if self.min_confidence > self.max_confidence {
            return Err(invalid(
                "scoring.min_confidence",
                "must not exceed max_confidence",
            ));
        }
        check_range("scoring.base_confidence", self.base_confidence, 0.0, 100.0)?;
        check_range("scoring.vol_sweet_spot_low", self.vol_sweet_spot_low, 0.0, 100.0)?;
        check_range("scoring.vol_sweet_spot_high", self.vol_sweet_spot_high, 0.0, 100.0)?;
        if self.vol_sweet_spot_low > self.vol_sweet_spot_high {
            return Err(invalid(
                "scoring.vol_sweet_spot_low",
                "must not exceed vol_sweet_spot_high",
            ));
        }
        check_range("scoring.volatility_min_trend", self.volatility_min_trend, 0.0, 1.0)?;
        check_positive("scoring.zone_proximity", self.zone_proximity)?;
        for (field, value) in [
            ("scoring.trend_bias", self.trend_bias),
            ("scoring.range_bias", self.range_bias),
            ("scoring.breakout_bias", self.breakout_bias),
            ("scoring.volatility_bias", self.volatility_bias),
            ("scoring.break_prob_weight", self.break_prob_weight),
            ("scoring.trend_strength_weight", self.trend_strength_weight),
            ("scoring.trend_strength_cap", self.trend_strength_cap),
            ("scoring.vol_sweet_spot_bonus", self.vol_sweet_spot_bonus),
            ("scoring.zone_bonus", self.zone_bonus),
        ] {
            check_range(field, value, 0.0, 100.0)?;
        }
        Ok(())
    }
}

// ─── Level calculator ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsConfig {
    /// How far past support/resistance the structural stop sits (fraction of the level).
    pub structure_buffer: f64,
    /// Added to the bucket target ratio for the second target.
    pub target_stretch: f64,
    /// Safety ceiling on risk as a fraction of entry price.
    pub max_risk_fraction: f64,
    /// Invalidation distance beyond the stop, as a fraction of risk.
    pub invalidation_buffer: f64,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            structure_buffer: 0.001,
            target_stretch: 1.0,
            max_risk_fraction: 0.03,
            invalidation_buffer: 0.1,
        }
    }
}

impl LevelsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("levels.structure_buffer", self.structure_buffer, 0.0, 0.5)?;
        check_range("levels.target_stretch", self.target_stretch, 0.0, 10.0)?;
        check_range("levels.max_risk_fraction", self.max_risk_fraction, 1e-9, 1.0)?;
        check_range("levels.invalidation_buffer", self.invalidation_buffer, 0.0, 10.0)?;
        Ok(())
    }
}

// ─── Timeframe classifier ────────────────────────────────────────────

/// Fixed characteristics of one holding-duration bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketProfile {
    /// Reward:risk multiple of the first target.
    pub target_ratio: f64,
    pub min_rr: f64,
    pub max_rr: f64,
    /// Expected holding period in bars.
    pub expected_bars: usize,
    /// Fixed fractional stop distance (fraction of entry price).
    pub stop_fraction: f64,
}

impl BucketProfile {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        check_positive(&format!("timeframe.{name}.target_ratio"), self.target_ratio)?;
        check_positive(&format!("timeframe.{name}.min_rr"), self.min_rr)?;
        if self.min_rr > self.max_rr {
            return Err(invalid(
                &format!("timeframe.{name}.min_rr"),
                "must not exceed max_rr",
            ));
        }
        // reward:risk of target1 is target_ratio by construction
        if !self.accepts(self.target_ratio) {
            return Err(invalid(
                &format!("timeframe.{name}.target_ratio"),
                format!(
                    "must lie in [{}, {}], got {}",
                    self.min_rr, self.max_rr, self.target_ratio
                ),
            ));
        }
        if self.expected_bars == 0 {
            return Err(invalid(&format!("timeframe.{name}.expected_bars"), "must be >= 1"));
        }
        check_range(
            &format!("timeframe.{name}.stop_fraction"),
            self.stop_fraction,
            1e-9,
            1.0,
        )
    }

    /// Whether a reward:risk ratio lies inside this bucket's band.
    pub fn accepts(&self, rr: f64) -> bool {
        rr >= self.min_rr && rr <= self.max_rr
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    pub short: BucketProfile,
    pub medium: BucketProfile,
    pub long: BucketProfile,
    /// |trend strength| at or above which the long bucket is chosen.
    pub strong_trend: f64,
    /// Volatility percentile at or above which the long bucket is chosen.
    pub high_vol_percentile: f64,
    /// Break probability at or above which a breakout-pending setup is held longer.
    pub breakout_break_prob: f64,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            short: BucketProfile {
                target_ratio: 1.5,
                min_rr: 1.2,
                max_rr: 2.0,
                expected_bars: 12,
                stop_fraction: 0.004,
            },
            medium: BucketProfile {
                target_ratio: 2.0,
                min_rr: 1.5,
                max_rr: 2.5,
                expected_bars: 36,
                stop_fraction: 0.007,
            },
            long: BucketProfile {
                target_ratio: 2.5,
                min_rr: 2.0,
                max_rr: 3.5,
                expected_bars: 96,
                stop_fraction: 0.012,
            },
            strong_trend: 0.7,
            high_vol_percentile: 85.0,
            breakout_break_prob: 0.7,
        }
    }
}

impl TimeframeConfig {
    pub fn profile(&self, bucket: TimeframeBucket) -> &BucketProfile {
        match bucket {
            TimeframeBucket::Short => &self.short,
            TimeframeBucket::Medium => &self.medium,
            TimeframeBucket::Long => &self.long,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.short.validate("short")?;
        self.medium.validate("medium")?;
        self.long.validate("long")?;
        check_range("timeframe.strong_trend", self.strong_trend, 0.0, 1.0)?;
        check_range("timeframe.high_vol_percentile", self.high_vol_percentile, 0.0, 100.0)?;
        check_range("timeframe.breakout_break_prob", self.breakout_break_prob, 0.0, 1.0)?;
        Ok(())
    }
}

// ─── Position sizing ─────────────────────────────────────────────────

/// Per-regime position-size factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeFactors {
    pub trending: f64,
    pub ranging: f64,
    pub breakout_pending: f64,
    pub high_volatility: f64,
    pub low_volatility: f64,
}

impl Default for RegimeFactors {
    fn default() -> Self {
        Self {
            trending: 1.1,
            ranging: 0.9,
            breakout_pending: 1.0,
            high_volatility: 0.6,
            low_volatility: 0.8,
        }
    }
}

impl RegimeFactors {
    pub fn factor(&self, regime: Regime) -> f64 {
        match regime {
            Regime::TrendingUp | Regime::TrendingDown => self.trending,
            Regime::Ranging => self.ranging,
            Regime::BreakoutPending => self.breakout_pending,
            Regime::HighVolatility => self.high_volatility,
            Regime::LowVolatility => self.low_volatility,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub regime_factors: RegimeFactors,
    /// Multiplier swing across the break-probability range, centred on 0.5.
    pub break_prob_weight: f64,
    /// Factor applied in low-liquidity sessions.
    pub low_liquidity_factor: f64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            regime_factors: RegimeFactors::default(),
            break_prob_weight: 0.4,
            low_liquidity_factor: 0.75,
            min_multiplier: 0.25,
            max_multiplier: 1.5,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.regime_factors;
        for (field, value) in [
            ("sizing.regime_factors.trending", f.trending),
            ("sizing.regime_factors.ranging", f.ranging),
            ("sizing.regime_factors.breakout_pending", f.breakout_pending),
            ("sizing.regime_factors.high_volatility", f.high_volatility),
            ("sizing.regime_factors.low_volatility", f.low_volatility),
        ] {
            check_positive(field, value)?;
        }
        check_range("sizing.break_prob_weight", self.break_prob_weight, 0.0, 1.0)?;
        check_positive("sizing.low_liquidity_factor", self.low_liquidity_factor)?;
        check_positive("sizing.min_multiplier", self.min_multiplier)?;
        if self.min_multiplier > self.max_multiplier {
            return Err(invalid(
                "sizing.min_multiplier",
                "must not exceed max_multiplier",
            ));
        }
        Ok(())
    }
}

// ─── Sessions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMultipliers {
    pub asian: f64,
    pub london: f64,
    pub overlap: f64,
    pub new_york: f64,
    pub off_hours: f64,
}

impl Default for SessionMultipliers {
    fn default() -> Self {
        Self {
            asian: 0.9,
            london: 1.05,
            overlap: 1.1,
            new_york: 1.05,
            off_hours: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Confidence multipliers per session.
    pub multipliers: SessionMultipliers,
    /// Sessions treated as thin liquidity by the classifier and sizer.
    pub low_liquidity: Vec<Session>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            multipliers: SessionMultipliers::default(),
            low_liquidity: vec![Session::Asian, Session::OffHours],
        }
    }
}

impl SessionConfig {
    pub fn multiplier(&self, session: Session) -> f64 {
        let m = &self.multipliers;
        match session {
            Session::Asian => m.asian,
            Session::London => m.london,
            Session::Overlap => m.overlap,
            Session::NewYork => m.new_york,
            Session::OffHours => m.off_hours,
        }
    }

    pub fn is_low_liquidity(&self, session: Session) -> bool {
        self.low_liquidity.contains(&session)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for s in Session::ALL {
            check_range(
                &format!("sessions.multipliers.{}", s.label()),
                self.multiplier(s),
                0.0,
                2.0,
            )?;
        }
        Ok(())
    }
}
