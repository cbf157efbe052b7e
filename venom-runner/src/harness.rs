//! Backtest harness: replays a signal source over historical bars.
//!
//! Per instrument, sample points are taken every `sampling_stride` bars once
//! a full trailing window is available. Each sample runs in isolation:
//!
//! 1. check every bar in the window (and in the forward horizon)
//! 2. call the source, catching panics
//! 3. resolve any signal against the forward bars (first touch, stop first)
//!
//! A failing sample is logged, counted in `failed_samples` and skipped; it
//! never touches the statistics already accumulated. Instruments replay in
//! parallel and their partial results are merged in symbol order, so the
//! aggregate does not depend on worker scheduling.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use thiserror::Error;
use venom_core::{Bar, BarError, Signal, SignalSource};

use crate::config::{HarnessConfig, HarnessError};
use crate::resolver::resolve;
use crate::result::{BacktestResult, TradeKey, TradeRecord};

/// Why a single sample index was skipped.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("bar {index} is unusable: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: BarError,
    },

    #[error("signal source panicked: {0}")]
    Panicked(String),

    #[error("signal source returned unusable levels (entry {entry}, stop {stop})")]
    InvalidSignal { entry: f64, stop: f64 },
}

/// Statistics plus the per-signal trade tape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestRun {
    pub result: BacktestResult,
    /// Sorted by `(symbol, index)`.
    pub trades: Vec<TradeRecord>,
}

impl BacktestRun {
    fn merge(mut self, other: BacktestRun) -> Self {
        self.result.merge(&other.result);
        self.trades.extend(other.trades);
        self
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn check_bars(bars: &[Bar], first_index: usize) -> Result<(), SampleError> {
    for (offset, bar) in bars.iter().enumerate() {
        bar.check().map_err(|source| SampleError::InvalidBar {
            index: first_index + offset,
            source,
        })?;
    }
    Ok(())
}

/// Run the source on the window ending at `index`, in isolation.
fn sample(
    source: &dyn SignalSource,
    symbol: &str,
    bars: &[Bar],
    index: usize,
    config: &HarnessConfig,
) -> Result<Option<Signal>, SampleError> {
    let start = index + 1 - config.window_len;
    let window = &bars[start..=index];
    check_bars(window, start)?;

    let generated = catch_unwind(AssertUnwindSafe(|| source.generate(symbol, window, None)))
        .map_err(|payload| SampleError::Panicked(panic_message(payload)))?;
    let Some(signal) = generated else {
        return Ok(None);
    };

    let risk = signal.risk();
    if !(signal.entry.is_finite() && signal.stop.is_finite() && risk.is_finite() && risk > 0.0) {
        return Err(SampleError::InvalidSignal {
            entry: signal.entry,
            stop: signal.stop,
        });
    }

    let horizon_end = bars.len().min(index + 1 + config.horizon(signal.expected_bars));
    check_bars(&bars[index + 1..horizon_end], index + 1)?;
    Ok(Some(signal))
}

/// Replay one instrument.
pub fn replay_instrument(
    source: &dyn SignalSource,
    symbol: &str,
    bars: &[Bar],
    config: &HarnessConfig,
) -> BacktestRun {
    let mut run = BacktestRun::default();
    if config.window_len == 0 || bars.len() < config.window_len {
        tracing::info!(symbol, bars = bars.len(), window = config.window_len, "not enough bars to sample");
        return run;
    }
    let pip_size = config.pip_size(symbol);

    for index in (config.window_len - 1..bars.len()).step_by(config.sampling_stride.max(1)) {
        run.result.samples += 1;
        let signal = match sample(source, symbol, bars, index, config) {
            Ok(Some(signal)) => signal,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(symbol, index, error = %e, "skipping sample");
                run.result.failed_samples += 1;
                continue;
            }
        };

        let key = TradeKey {
            symbol,
            session: signal.session,
            timeframe: signal.timeframe,
            regime: signal.regime,
        };
        run.result.record_generated(&key);

        let forward = &bars[index + 1..];
        let resolution = resolve(&signal, forward, config.horizon(signal.expected_bars));
        let (pips, pnl) = match &resolution {
            Some(r) => {
                let pips = r.price_move(&signal) / pip_size;
                let pnl = pips * config.pip_value * signal.position_size_multiplier;
                run.result.record_outcome(&key, r.outcome, pips, pnl);
                tracing::debug!(
                    symbol,
                    index,
                    outcome = ?r.outcome,
                    pips,
                    bars_held = r.bars_held,
                    "signal resolved"
                );
                (pips, pnl)
            }
            None => {
                run.result.record_unresolved(&key);
                (0.0, 0.0)
            }
        };

        run.trades.push(TradeRecord {
            symbol: symbol.to_string(),
            index,
            generated_at: signal.generated_at,
            exit_at: resolution.map(|r| forward[r.exit_offset].timestamp),
            direction: signal.direction,
            regime: signal.regime,
            timeframe: signal.timeframe,
            session: signal.session,
            confidence: signal.confidence,
            entry: signal.entry,
            stop: signal.stop,
            target1: signal.target1,
            risk_reward: signal.risk_reward,
            position_size_multiplier: signal.position_size_multiplier,
            outcome: resolution.map(|r| r.outcome),
            exit_price: resolution.map(|r| r.exit_price),
            bars_held: resolution.map_or(0, |r| r.bars_held),
            pips,
            pnl,
            ambiguous: resolution.is_some_and(|r| r.ambiguous),
        });
    }

    let t = &run.result.totals;
    tracing::info!(
        symbol,
        samples = run.result.samples,
        generated = t.generated,
        wins = t.wins,
        losses = t.losses,
        failed = run.result.failed_samples,
        "instrument replayed"
    );
    run
}

/// Replay every instrument and merge the results.
pub fn run_backtest(
    source: &dyn SignalSource,
    data: &BTreeMap<String, Vec<Bar>>,
    config: &HarnessConfig,
) -> Result<BacktestRun, HarnessError> {
    config.validate()?;
    if config.window_len < source.min_bars() {
        tracing::warn!(
            window = config.window_len,
            min_bars = source.min_bars(),
            "window shorter than the source minimum; no signals will be produced"
        );
    }
    tracing::info!(
        source = source.name(),
        instruments = data.len(),
        stride = config.sampling_stride,
        window = config.window_len,
        parallel = config.parallel,
        "starting backtest"
    );

    let instruments: Vec<(&String, &Vec<Bar>)> = data.iter().collect();
    let replay = |(symbol, bars): &(&String, &Vec<Bar>)| {
        replay_instrument(source, symbol.as_str(), bars.as_slice(), config)
    };

    let partials: Vec<BacktestRun> = if config.parallel {
        match config.threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                pool.install(|| instruments.par_iter().map(replay).collect())
            }
            None => instruments.par_iter().map(replay).collect(),
        }
    } else {
        instruments.iter().map(replay).collect()
    };

    // partials are in symbol order; merging them in that order keeps the
    // trade tape sorted by (symbol, index)
    let run = partials
        .into_iter()
        .fold(BacktestRun::default(), BacktestRun::merge);

    let t = &run.result.totals;
    tracing::info!(
        generated = t.generated,
        resolved = t.resolved,
        win_rate = t.win_rate(),
        pips = t.total_pips(),
        failed = run.result.failed_samples,
        "backtest complete"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use venom_core::{Direction, Regime, Session, StrengthTier, TimeframeBucket};

    /// Emits a buy on every window with a 1.0 stop and 1.5 target.
    struct FixedSource;

    impl SignalSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        fn min_bars(&self) -> usize {
            1
        }
        fn generate(&self, symbol: &str, window: &[Bar], _: Option<Session>) -> Option<Signal> {
            let last = window.last()?;
            Some(Signal {
                symbol: symbol.to_string(),
                direction: Direction::Buy,
                confidence: 70.0,
                strength: StrengthTier::Moderate,
                entry: last.close,
                stop: last.close - 1.0,
                target1: last.close + 1.5,
                target2: last.close + 2.5,
                risk_reward: 1.5,
                position_size_multiplier: 1.0,
                regime: Regime::Ranging,
                timeframe: TimeframeBucket::Short,
                expected_bars: 2,
                rationale: String::new(),
                invalidation: last.close - 1.1,
                session: last.effective_session(),
                generated_at: last.timestamp,
            })
        }
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Bar {
                timestamp: base + Duration::hours(i as i64),
                open: 100.0,
                high: 100.2,
                low: 99.8,
                close: 100.0,
                volume: 1.0,
                session: None,
            })
            .collect()
    }

    fn config(window_len: usize, stride: usize) -> HarnessConfig {
        HarnessConfig {
            sampling_stride: stride,
            window_len,
            horizon_buffer: 0,
            parallel: false,
            pip_sizes: [("TEST".to_string(), 0.01)].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn sample_points_follow_stride() {
        let bars = flat_bars(20);
        let run = replay_instrument(&FixedSource, "TEST", &bars, &config(5, 3));
        // indices 4, 7, 10, 13, 16, 19
        assert_eq!(run.result.samples, 6);
        let indices: Vec<usize> = run.trades.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![4, 7, 10, 13, 16, 19]);
    }

    #[test]
    fn flat_market_times_out_then_runs_out_of_data() {
        let bars = flat_bars(10);
        let run = replay_instrument(&FixedSource, "TEST", &bars, &config(5, 1));
        let t = &run.result.totals;
        // samples 4..=9; the last two have fewer than 2 forward bars
        assert_eq!(t.generated, 6);
        assert_eq!(t.timeouts, 4);
        assert_eq!(t.losses, 4);
        assert_eq!(t.unresolved, 2);
        assert_eq!(t.pips_milli, 0);
    }

    #[test]
    fn insane_bar_skips_only_affected_samples() {
        let mut bars = flat_bars(12);
        bars[6].high = 90.0;
        let run = replay_instrument(&FixedSource, "TEST", &bars, &config(3, 1));
        // windows containing bar 6 end at 6, 7, 8; forward horizons of
        // samples 4 and 5 reach it too
        assert_eq!(run.result.failed_samples, 5);
        assert_eq!(run.result.samples, 10);
        assert_eq!(run.result.totals.generated, 5);
    }

    #[test]
    fn short_series_produces_nothing() {
        let run = replay_instrument(&FixedSource, "TEST", &flat_bars(3), &config(5, 1));
        assert_eq!(run, BacktestRun::default());
    }

    #[test]
    fn rejects_invalid_config() {
        let data = BTreeMap::new();
        let cfg = config(0, 1);
        assert!(run_backtest(&FixedSource, &data, &cfg).is_err());
    }
}
