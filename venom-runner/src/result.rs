//! Backtest statistics with an exact, order-independent merge.
//!
//! Pip and currency totals are accumulated in integer fixed-point units
//! (thousandths of a pip, cents). Each trade is rounded once when it is
//! recorded, after which merging is plain integer addition: associative,
//! commutative and independent of how instruments were split across workers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use venom_core::{Direction, Regime, Session, TimeframeBucket};

use crate::resolver::Outcome;

/// Bump when the serialized report layout changes.
pub const SCHEMA_VERSION: u32 = 1;

const PIP_SCALE: f64 = 1_000.0;
const CASH_SCALE: f64 = 100.0;

fn to_fixed(value: f64, scale: f64) -> i64 {
    if value.is_finite() {
        (value * scale).round() as i64
    } else {
        0
    }
}

/// Counters and totals for one slice of the backtest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub generated: u64,
    /// Wins plus losses (timeouts count as losses).
    pub resolved: u64,
    pub wins: u64,
    pub losses: u64,
    pub timeouts: u64,
    /// Signals whose data ended before they could resolve.
    pub unresolved: u64,
    /// Net pips, in thousandths.
    pub pips_milli: i64,
    pub gross_win_pips_milli: i64,
    /// Magnitude of losing pips, in thousandths.
    pub gross_loss_pips_milli: i64,
    /// Net account-currency result, in cents.
    pub pnl_cents: i64,
}

impl Tally {
    pub fn record_generated(&mut self) {
        self.generated += 1;
    }

    pub fn record_unresolved(&mut self) {
        self.unresolved += 1;
    }

    /// Record a resolved signal. `pips` and `pnl` are rounded to the
    /// fixed-point units here and nowhere else.
    pub fn record_outcome(&mut self, outcome: Outcome, pips: f64, pnl: f64) {
        let pips_milli = to_fixed(pips, PIP_SCALE);
        self.resolved += 1;
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::TimedOut => {
                self.losses += 1;
                self.timeouts += 1;
            }
        }
        self.pips_milli += pips_milli;
        if pips_milli > 0 {
            self.gross_win_pips_milli += pips_milli;
        } else {
            self.gross_loss_pips_milli -= pips_milli;
        }
        self.pnl_cents += to_fixed(pnl, CASH_SCALE);
    }

    pub fn merge(&mut self, other: &Tally) {
        self.generated += other.generated;
        self.resolved += other.resolved;
        self.wins += other.wins;
        self.losses += other.losses;
        self.timeouts += other.timeouts;
        self.unresolved += other.unresolved;
        self.pips_milli += other.pips_milli;
        self.gross_win_pips_milli += other.gross_win_pips_milli;
        self.gross_loss_pips_milli += other.gross_loss_pips_milli;
        self.pnl_cents += other.pnl_cents;
    }

    pub fn total_pips(&self) -> f64 {
        self.pips_milli as f64 / PIP_SCALE
    }

    pub fn total_pnl(&self) -> f64 {
        self.pnl_cents as f64 / CASH_SCALE
    }

    /// Wins over resolved signals; 0 when nothing resolved.
    pub fn win_rate(&self) -> f64 {
        if self.resolved == 0 {
            return 0.0;
        }
        self.wins as f64 / self.resolved as f64
    }

    /// Gross winning pips over gross losing pips. `None` without losses.
    pub fn profit_factor(&self) -> Option<f64> {
        if self.gross_loss_pips_milli == 0 {
            return None;
        }
        Some(self.gross_win_pips_milli as f64 / self.gross_loss_pips_milli as f64)
    }

    /// Net pips per resolved signal; 0 when nothing resolved.
    pub fn avg_pips(&self) -> f64 {
        if self.resolved == 0 {
            return 0.0;
        }
        self.total_pips() / self.resolved as f64
    }
}

/// Aggregate result of a backtest, broken down by instrument, session,
/// timeframe bucket and regime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub totals: Tally,
    /// Sample indices skipped because the window or the source failed.
    pub failed_samples: u64,
    /// Sample points evaluated.
    pub samples: u64,
    pub by_instrument: BTreeMap<String, Tally>,
    pub by_session: BTreeMap<Session, Tally>,
    pub by_timeframe: BTreeMap<TimeframeBucket, Tally>,
    pub by_regime: BTreeMap<Regime, Tally>,
}

fn merge_map<K: Ord + Clone>(into: &mut BTreeMap<K, Tally>, from: &BTreeMap<K, Tally>) {
    for (k, t) in from {
        into.entry(k.clone()).or_default().merge(t);
    }
}

impl BacktestResult {
    pub fn merge(&mut self, other: &BacktestResult) {
        self.totals.merge(&other.totals);
        self.failed_samples += other.failed_samples;
        self.samples += other.samples;
        merge_map(&mut self.by_instrument, &other.by_instrument);
        merge_map(&mut self.by_session, &other.by_session);
        merge_map(&mut self.by_timeframe, &other.by_timeframe);
        merge_map(&mut self.by_regime, &other.by_regime);
    }

    /// Merge by value, for folds and reductions.
    pub fn merged(mut self, other: &BacktestResult) -> Self {
        self.merge(other);
        self
    }

    fn each_tally(&mut self, key: &TradeKey<'_>, mut f: impl FnMut(&mut Tally)) {
        f(&mut self.totals);
        f(self.by_instrument.entry(key.symbol.to_string()).or_default());
        f(self.by_session.entry(key.session).or_default());
        f(self.by_timeframe.entry(key.timeframe).or_default());
        f(self.by_regime.entry(key.regime).or_default());
    }

    pub fn record_generated(&mut self, key: &TradeKey<'_>) {
        self.each_tally(key, Tally::record_generated);
    }

    pub fn record_outcome(&mut self, key: &TradeKey<'_>, outcome: Outcome, pips: f64, pnl: f64) {
        self.each_tally(key, |t| t.record_outcome(outcome, pips, pnl));
    }

    pub fn record_unresolved(&mut self, key: &TradeKey<'_>) {
        self.each_tally(key, Tally::record_unresolved);
    }
}

/// Breakdown keys of one signal.
#[derive(Debug, Clone, Copy)]
pub struct TradeKey<'a> {
    pub symbol: &'a str,
    pub session: Session,
    pub timeframe: TimeframeBucket,
    pub regime: Regime,
}

/// One row of the trade tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    /// Index of the bar the signal was generated on.
    pub index: usize,
    pub generated_at: DateTime<Utc>,
    pub exit_at: Option<DateTime<Utc>>,
    pub direction: Direction,
    pub regime: Regime,
    pub timeframe: TimeframeBucket,
    pub session: Session,
    pub confidence: f64,
    pub entry: f64,
    pub stop: f64,
    pub target1: f64,
    pub risk_reward: f64,
    pub position_size_multiplier: f64,
    /// `None` when the data ended before the signal resolved.
    pub outcome: Option<Outcome>,
    pub exit_price: Option<f64>,
    pub bars_held: usize,
    pub pips: f64,
    pub pnl: f64,
    /// The deciding bar spanned both stop and target.
    pub ambiguous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str) -> TradeKey<'_> {
        TradeKey {
            symbol,
            session: Session::London,
            timeframe: TimeframeBucket::Short,
            regime: Regime::Ranging,
        }
    }

    #[test]
    fn tally_counts_timeouts_as_losses() {
        let mut t = Tally::default();
        t.record_outcome(Outcome::Win, 15.0, 150.0);
        t.record_outcome(Outcome::Loss, -10.0, -100.0);
        t.record_outcome(Outcome::TimedOut, 0.0, 0.0);
        assert_eq!(t.resolved, 3);
        assert_eq!(t.wins, 1);
        assert_eq!(t.losses, 2);
        assert_eq!(t.timeouts, 1);
        assert_eq!(t.total_pips(), 5.0);
        assert_eq!(t.total_pnl(), 50.0);
        assert!((t.win_rate() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(t.profit_factor(), Some(1.5));
        assert!((t.avg_pips() - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_tally_ratios_are_guarded() {
        let t = Tally::default();
        assert_eq!(t.win_rate(), 0.0);
        assert_eq!(t.avg_pips(), 0.0);
        assert_eq!(t.profit_factor(), None);
    }

    #[test]
    fn record_updates_every_breakdown() {
        let mut r = BacktestResult::default();
        r.record_generated(&key("EURUSD"));
        r.record_outcome(&key("EURUSD"), Outcome::Win, 12.0, 120.0);
        assert_eq!(r.totals.wins, 1);
        assert_eq!(r.by_instrument["EURUSD"].wins, 1);
        assert_eq!(r.by_session[&Session::London].generated, 1);
        assert_eq!(r.by_timeframe[&TimeframeBucket::Short].resolved, 1);
        assert_eq!(r.by_regime[&Regime::Ranging].pips_milli, 12_000);
    }

    #[test]
    fn merge_adds_disjoint_and_shared_keys() {
        let mut a = BacktestResult::default();
        a.record_generated(&key("EURUSD"));
        a.record_outcome(&key("EURUSD"), Outcome::Loss, -8.0, -80.0);
        let mut b = BacktestResult::default();
        b.record_generated(&key("GBPUSD"));
        b.record_outcome(&key("GBPUSD"), Outcome::Win, 20.0, 200.0);
        b.failed_samples = 2;

        let ab = a.clone().merged(&b);
        let ba = b.clone().merged(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.totals.generated, 2);
        assert_eq!(ab.by_instrument.len(), 2);
        assert_eq!(ab.by_session[&Session::London].resolved, 2);
        assert_eq!(ab.failed_samples, 2);
    }

    #[test]
    fn result_json_uses_readable_keys() {
        let mut r = BacktestResult::default();
        r.record_generated(&key("EURUSD"));
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"london\""), "{json}");
        assert!(json.contains("\"ranging\""));
        let back: BacktestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
