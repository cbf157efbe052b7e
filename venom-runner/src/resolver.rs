//! First-touch resolution of a signal against forward bars.
//!
//! Bars are scanned in order. The first bar whose range reaches the stop or
//! the first target decides the outcome. When one bar's range reaches both,
//! the stop wins: intrabar order is unknown, so the adverse path is assumed.
//! If nothing is touched within the horizon the signal times out as a loss
//! with zero pips.

use serde::{Deserialize, Serialize};
use venom_core::{Bar, Direction, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    TimedOut,
}

/// How a signal ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: Outcome,
    /// Offset into the forward slice of the deciding bar.
    pub exit_offset: usize,
    pub exit_price: f64,
    /// Forward bars consumed, including the deciding bar.
    pub bars_held: usize,
    /// The deciding bar reached both stop and target.
    pub ambiguous: bool,
}

impl Resolution {
    /// Signed result in price units: reward for wins, minus risk for
    /// losses, zero for timeouts.
    pub fn price_move(&self, signal: &Signal) -> f64 {
        match self.outcome {
            Outcome::Win => signal.reward(),
            Outcome::Loss => -signal.risk(),
            Outcome::TimedOut => 0.0,
        }
    }
}

fn touches(direction: Direction, bar: &Bar, stop: f64, target: f64) -> (bool, bool) {
    match direction {
        Direction::Buy => (bar.low <= stop, bar.high >= target),
        Direction::Sell => (bar.high >= stop, bar.low <= target),
    }
}

/// Resolve `signal` against the bars that follow it.
///
/// At most `horizon` bars of `forward` are scanned. Returns `None` when
/// neither level is touched and fewer than `horizon` bars were available:
/// the data ran out before the signal could resolve.
pub fn resolve(signal: &Signal, forward: &[Bar], horizon: usize) -> Option<Resolution> {
    let scan = &forward[..forward.len().min(horizon)];
    for (offset, bar) in scan.iter().enumerate() {
        let (stop_hit, target_hit) = touches(signal.direction, bar, signal.stop, signal.target1);
        if stop_hit {
            return Some(Resolution {
                outcome: Outcome::Loss,
                exit_offset: offset,
                exit_price: signal.stop,
                bars_held: offset + 1,
                ambiguous: target_hit,
            });
        }
        if target_hit {
            return Some(Resolution {
                outcome: Outcome::Win,
                exit_offset: offset,
                exit_price: signal.target1,
                bars_held: offset + 1,
                ambiguous: false,
            });
        }
    }

    if horizon == 0 || scan.len() < horizon {
        return None;
    }
    let last = scan.len() - 1;
    Some(Resolution {
        outcome: Outcome::TimedOut,
        exit_offset: last,
        exit_price: scan[last].close,
        bars_held: scan.len(),
        ambiguous: false,
    })
}
