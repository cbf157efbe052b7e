//! Signal assembler: composes the analyzer, scorer, classifier and level
//! calculator into one immutable [`Signal`].
//!
//! [`SignalSource`] is the seam the backtest harness replays. It receives a
//! symbol and a trailing bar window and never sees harness state, so a
//! source can be swapped without touching resolution or aggregation.

use std::fmt::Write as _;

use crate::config::EngineConfig;
use crate::domain::{Bar, Session, Signal, StrengthTier};
use crate::levels::{calculate_levels, StopSource, TradeLevels};
use crate::scoring::{score, Score};
use crate::structure::{self, MarketStructure};
use crate::timeframe::{classify, TimeframeChoice};

/// Anything that turns a trailing bar window into an optional signal.
pub trait SignalSource: Send + Sync {
    /// Human-readable name used in logs and reports.
    fn name(&self) -> &str;

    /// Bars required before the source can produce output.
    fn min_bars(&self) -> usize;

    /// Produce a signal for the latest bar of `window`, or `None`.
    ///
    /// `session` overrides the session derived from the latest bar.
    fn generate(&self, symbol: &str, window: &[Bar], session: Option<Session>) -> Option<Signal>;
}

/// The VENOM market-structure engine.
#[derive(Debug, Clone, Default)]
pub struct SignalEngine {
    config: EngineConfig,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, window: &[Bar]) -> MarketStructure {
        analyze(window, &self.config)
    }
}

impl SignalSource for SignalEngine {
    fn name(&self) -> &str {
        "venom"
    }

    fn min_bars(&self) -> usize {
        self.config.structure.min_bars
    }

    fn generate(&self, symbol: &str, window: &[Bar], session: Option<Session>) -> Option<Signal> {
        generate_signal(symbol, window, session, &self.config)
    }
}

/// Analyze a window with the structure section of `config`.
///
/// Never fails; short or unusable windows get the neutral default structure.
pub fn analyze(window: &[Bar], config: &EngineConfig) -> MarketStructure {
    structure::analyze(window, &config.structure)
}

/// Run the full pipeline over `window` and return a signal for its latest bar.
///
/// Returns `None` when the window is too short, no direction is established,
/// or the levels fail a rejection rule. The entry is the latest close.
pub fn generate_signal(
    symbol: &str,
    window: &[Bar],
    session: Option<Session>,
    config: &EngineConfig,
) -> Option<Signal> {
    let last = window.last()?;
    let structure = analyze(window, config);
    if structure.is_default {
        tracing::trace!(symbol, bars = window.len(), "insufficient data, no signal");
        return None;
    }

    let session = session.unwrap_or_else(|| last.effective_session());
    let price = last.close;

    let score = score(&structure, price, Some(session), config)?;
    let choice = classify(&structure, Some(session), config);
    let profile = config.timeframe.profile(choice.bucket);
    let levels = calculate_levels(score.direction, &structure, price, profile, &config.levels)?;

    let rationale = rationale(&structure, &score, &choice, &levels, session);
    tracing::debug!(
        symbol,
        direction = %score.direction,
        confidence = score.confidence,
        regime = %structure.regime,
        bucket = %choice.bucket,
        "signal generated"
    );

    Some(Signal {
        symbol: symbol.to_string(),
        direction: score.direction,
        confidence: score.confidence,
        strength: StrengthTier::from_confidence(score.confidence),
        entry: levels.entry,
        stop: levels.stop,
        target1: levels.target1,
        target2: levels.target2,
        risk_reward: levels.risk_reward,
        position_size_multiplier: choice.size_multiplier,
        regime: structure.regime,
        timeframe: choice.bucket,
        expected_bars: profile.expected_bars,
        rationale,
        invalidation: levels.invalidation,
        session,
        generated_at: last.timestamp,
    })
}

fn rationale(
    structure: &MarketStructure,
    score: &Score,
    choice: &TimeframeChoice,
    levels: &TradeLevels,
    session: Session,
) -> String {
    let mut out = format!(
        "{} regime, {}; break probability {:.2}, trend strength {:+.2}, volatility pct {:.0}",
        structure.regime,
        score.reason.describe(),
        structure.structure_break_probability,
        structure.trend_strength,
        structure.volatility_percentile,
    );
    if score.breakdown.liquidity_zone > 0.0 {
        out.push_str(", near liquidity zone");
    }
    let stop = match levels.stop_source {
        StopSource::Fixed => "fixed stop",
        StopSource::Structural => "structural stop",
    };
    let _ = write!(
        out,
        "; {} hold ({:?}), {}, {} session",
        choice.bucket, choice.reason, stop, session
    );
    out
}
