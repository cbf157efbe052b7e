//! Integration tests for the backtest harness.
//!
//! Covers the same-bar tie-break, determinism across scheduling, partial
//! failure isolation and the algebra of result merging.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use venom_core::synthetic::SyntheticSpec;
use venom_core::{
    Bar, Direction, EngineConfig, Regime, Session, Signal, SignalEngine, SignalSource,
    StrengthTier, TimeframeBucket,
};
use venom_runner::result::TradeKey;
use venom_runner::{
    run_backtest, synthetic_data, BacktestResult, HarnessConfig, Outcome,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: Utc.with_ymd_and_hms(2024, 2, 5, 8, 0, 0).unwrap() + Duration::hours(i),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
        session: None,
    }
}

fn buy(symbol: &str, last: &Bar, stop: f64, target: f64, expected_bars: usize) -> Signal {
    Signal {
        symbol: symbol.to_string(),
        direction: Direction::Buy,
        confidence: 70.0,
        strength: StrengthTier::Moderate,
        entry: last.close,
        stop,
        target1: target,
        target2: target + 1.0,
        risk_reward: (target - last.close) / (last.close - stop),
        position_size_multiplier: 1.0,
        regime: Regime::Ranging,
        timeframe: TimeframeBucket::Short,
        expected_bars,
        rationale: String::new(),
        invalidation: stop - 0.1,
        session: last.effective_session(),
        generated_at: last.timestamp,
    }
}

/// Buys only on a bar closing at exactly 100.
struct AtHundred;

impl SignalSource for AtHundred {
    fn name(&self) -> &str {
        "at_hundred"
    }
    fn min_bars(&self) -> usize {
        1
    }
    fn generate(&self, symbol: &str, window: &[Bar], _: Option<Session>) -> Option<Signal> {
        let last = window.last()?;
        (last.close == 100.0).then(|| buy(symbol, last, 99.0, 101.5, 3))
    }
}

/// Wraps the engine but panics on windows whose last close is above a level.
struct Flaky {
    inner: SignalEngine,
    panic_above: f64,
}

impl SignalSource for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }
    fn min_bars(&self) -> usize {
        self.inner.min_bars()
    }
    fn generate(&self, symbol: &str, window: &[Bar], session: Option<Session>) -> Option<Signal> {
        let last = window.last()?;
        if last.close > self.panic_above {
            panic!("injected failure at {}", last.timestamp);
        }
        self.inner.generate(symbol, window, session)
    }
}

/// The engine with the same cut-off, returning nothing instead of panicking.
struct Quiet {
    inner: SignalEngine,
    above: f64,
}

impl SignalSource for Quiet {
    fn name(&self) -> &str {
        "quiet"
    }
    fn min_bars(&self) -> usize {
        self.inner.min_bars()
    }
    fn generate(&self, symbol: &str, window: &[Bar], session: Option<Session>) -> Option<Signal> {
        let last = window.last()?;
        if last.close > self.above {
            return None;
        }
        self.inner.generate(symbol, window, session)
    }
}

fn synthetic(symbols: &[&str], bars: usize, seed: u64) -> BTreeMap<String, Vec<Bar>> {
    let spec = SyntheticSpec { bars, ..Default::default() };
    let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    synthetic_data(&symbols, seed, &spec).bars
}

// ── Scenario C: same-bar tie-break ───────────────────────────────────

#[test]
fn bar_spanning_stop_and_target_is_a_loss() {
    let bars = vec![
        bar(0, 99.9, 100.1, 99.8, 100.0),
        bar(1, 100.0, 100.4, 99.6, 100.2),
        // spans both 99.0 and 101.5
        bar(2, 100.2, 102.0, 98.5, 100.3),
        bar(3, 100.3, 103.0, 100.1, 102.8),
    ];
    let data: BTreeMap<String, Vec<Bar>> = [("TEST".to_string(), bars)].into_iter().collect();
    let cfg = HarnessConfig {
        sampling_stride: 1,
        window_len: 1,
        horizon_buffer: 0,
        parallel: false,
        pip_sizes: [("TEST".to_string(), 0.01)].into_iter().collect(),
        ..Default::default()
    };
    let run = run_backtest(&AtHundred, &data, &cfg).unwrap();
    let t = &run.result.totals;
    assert_eq!(t.generated, 1);
    assert_eq!(t.losses, 1);
    assert_eq!(t.wins, 0);
    assert_eq!(t.timeouts, 0);
    assert_eq!(t.total_pips(), -100.0);

    let trade = &run.trades[0];
    assert_eq!(trade.outcome, Some(Outcome::Loss));
    assert!(trade.ambiguous);
    assert_eq!(trade.bars_held, 2);
    assert_eq!(trade.exit_price, Some(99.0));
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn results_do_not_depend_on_scheduling() {
    let data = synthetic(&["EURUSD", "GBPUSD", "AUDUSD", "USDJPY"], 1_500, 11);
    let engine = SignalEngine::new(EngineConfig::default());
    let base = HarnessConfig {
        sampling_stride: 3,
        window_len: 60,
        ..Default::default()
    };

    let serial = run_backtest(&engine, &data, &HarnessConfig { parallel: false, ..base.clone() }).unwrap();
    let global = run_backtest(&engine, &data, &HarnessConfig { parallel: true, ..base.clone() }).unwrap();
    let pooled = run_backtest(
        &engine,
        &data,
        &HarnessConfig { parallel: true, threads: Some(3), ..base.clone() },
    )
    .unwrap();

    assert_eq!(serial, global);
    assert_eq!(serial, pooled);
    assert_eq!(run_backtest(&engine, &data, &base).unwrap(), serial);
}

#[test]
fn trade_tape_is_sorted_and_consistent_with_totals() {
    let data = synthetic(&["GBPUSD", "EURUSD"], 1_200, 5);
    let engine = SignalEngine::default();
    let cfg = HarnessConfig { sampling_stride: 2, window_len: 50, ..Default::default() };
    let run = run_backtest(&engine, &data, &cfg).unwrap();

    let keys: Vec<(String, usize)> = run.trades.iter().map(|t| (t.symbol.clone(), t.index)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let t = &run.result.totals;
    assert_eq!(run.trades.len() as u64, t.generated);
    assert_eq!(t.generated, t.resolved + t.unresolved);
    assert_eq!(t.resolved, t.wins + t.losses);
    let per_instrument: u64 = run.result.by_instrument.values().map(|x| x.generated).sum();
    assert_eq!(per_instrument, t.generated);
    for trade in &run.trades {
        let profile = engine.config().timeframe.profile(trade.timeframe);
        assert!(profile.accepts(trade.risk_reward));
        assert!(trade.confidence >= engine.config().scoring.min_confidence);
    }
}

// ── Regime coverage ──────────────────────────────────────────────────

#[test]
fn default_engine_signals_in_trend_and_volatility_regimes() {
    let data = synthetic(
        &["EURUSD", "GBPUSD", "AUDUSD", "NZDUSD", "USDCAD", "USDCHF"],
        5_000,
        42,
    );
    let engine = SignalEngine::default();
    let run = run_backtest(&engine, &data, &HarnessConfig::default()).unwrap();

    let generated = |regimes: &[Regime]| -> u64 {
        regimes
            .iter()
            .filter_map(|r| run.result.by_regime.get(r))
            .map(|t| t.generated)
            .sum()
    };
    let trending = generated(&[Regime::TrendingUp, Regime::TrendingDown]);
    let volatile = generated(&[Regime::HighVolatility, Regime::LowVolatility]);
    assert!(trending > 0, "no trend signals: {:?}", run.result.by_regime.keys());
    assert!(volatile > 0, "no volatility signals: {:?}", run.result.by_regime.keys());

    let ceiling = engine.config().levels.max_risk_fraction;
    for trade in run.trades.iter().filter(|t| t.regime.is_trending()) {
        assert!((trade.entry - trade.stop).abs() / trade.entry <= ceiling + 1e-12);
    }
}

// ── Partial failure ──────────────────────────────────────────────────

#[test]
fn panicking_samples_are_skipped_without_corrupting_totals() {
    let data = synthetic(&["EURUSD", "GBPUSD"], 1_000, 21);
    let cfg = HarnessConfig { sampling_stride: 2, window_len: 50, parallel: false, ..Default::default() };

    // median close as the cut-off so some samples fail and some succeed
    let mut closes: Vec<f64> = data.values().flatten().map(|b| b.close).collect();
    closes.sort_by(|a, b| a.total_cmp(b));
    let cut = closes[closes.len() / 2];

    let flaky = Flaky { inner: SignalEngine::default(), panic_above: cut };
    let quiet = Quiet { inner: SignalEngine::default(), above: cut };
    let with_failures = run_backtest(&flaky, &data, &cfg).unwrap();
    let clean = run_backtest(&quiet, &data, &cfg).unwrap();

    assert!(with_failures.result.failed_samples > 0);
    assert_eq!(clean.result.failed_samples, 0);
    assert_eq!(with_failures.result.samples, clean.result.samples);
    assert_eq!(with_failures.result.totals, clean.result.totals);
    assert_eq!(with_failures.trades, clean.trades);
}

#[test]
fn corrupt_bar_only_affects_overlapping_samples() {
    let mut data = synthetic(&["EURUSD"], 600, 3);
    let cfg = HarnessConfig { sampling_stride: 1, window_len: 40, parallel: false, ..Default::default() };
    if let Some(series) = data.get_mut("EURUSD") {
        series[300].close = f64::NAN;
    }
    let run = run_backtest(&SignalEngine::default(), &data, &cfg).unwrap();
    // every window ending at 300..=339 contains the bad bar
    assert!(run.result.failed_samples >= 40);
    assert!(run.result.samples > run.result.failed_samples);
    assert!(run.trades.iter().all(|t| t.index < 300 || t.index >= 340));
}

// ── Merge algebra ────────────────────────────────────────────────────

const SYMBOLS: [&str; 3] = ["EURUSD", "GBPUSD", "USDJPY"];

fn arb_result() -> impl Strategy<Value = BacktestResult> {
    prop::collection::vec(
        (0..3usize, 0..5usize, 0..3usize, 0..6usize, 0..4u8, -500.0..500.0_f64, 0..3u64),
        0..20,
    )
    .prop_map(|events| {
        let mut r = BacktestResult::default();
        for (sym, sess, tf, reg, kind, pips, failed) in events {
            let key = TradeKey {
                symbol: SYMBOLS[sym],
                session: Session::ALL[sess],
                timeframe: TimeframeBucket::ALL[tf],
                regime: Regime::ALL[reg],
            };
            r.samples += 1;
            r.failed_samples += failed;
            r.record_generated(&key);
            match kind {
                0 => r.record_outcome(&key, Outcome::Win, pips.abs(), pips.abs() * 10.0),
                1 => r.record_outcome(&key, Outcome::Loss, -pips.abs(), -pips.abs() * 10.0),
                2 => r.record_outcome(&key, Outcome::TimedOut, 0.0, 0.0),
                _ => r.record_unresolved(&key),
            }
        }
        r
    })
}

proptest! {
    #[test]
    fn merge_is_commutative(a in arb_result(), b in arb_result()) {
        prop_assert_eq!(a.clone().merged(&b), b.clone().merged(&a));
    }

    #[test]
    fn merge_is_associative(a in arb_result(), b in arb_result(), c in arb_result()) {
        let left = a.clone().merged(&b).merged(&c);
        let right = a.clone().merged(&b.clone().merged(&c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn empty_result_is_identity(a in arb_result()) {
        prop_assert_eq!(a.clone().merged(&BacktestResult::default()), a.clone());
        prop_assert_eq!(BacktestResult::default().merged(&a), a);
    }
}
