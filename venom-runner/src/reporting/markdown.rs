//! Markdown summary of a backtest report.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Write as _;

use crate::result::Tally;

use super::BacktestReport;

fn pct(x: f64) -> String {
    format!("{:.1}%", x * 100.0)
}

fn profit_factor(t: &Tally) -> String {
    match t.profit_factor() {
        Some(pf) => format!("{pf:.2}"),
        None if t.gross_win_pips_milli > 0 => "inf".to_string(),
        None => "n/a".to_string(),
    }
}

fn breakdown_table<K: Display>(md: &mut String, title: &str, rows: &BTreeMap<K, Tally>) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(md, "## By {title}\n");
    md.push_str("| Key | Signals | Resolved | Wins | Losses | Timeouts | Win Rate | Net Pips | PnL |\n");
    md.push_str("| --- | ---: | ---: | ---: | ---: | ---: | ---: | ---: | ---: |\n");
    for (key, t) in rows {
        let _ = writeln!(
            md,
            "| {key} | {} | {} | {} | {} | {} | {} | {:.1} | {:.2} |",
            t.generated,
            t.resolved,
            t.wins,
            t.losses,
            t.timeouts,
            pct(t.win_rate()),
            t.total_pips(),
            t.total_pnl(),
        );
    }
    md.push('\n');
}

/// Render a single-run Markdown report.
pub fn render_markdown(report: &BacktestReport) -> String {
    let mut md = String::with_capacity(4096);
    let meta = &report.metadata;
    let r = &report.result;
    let t = &r.totals;

    md.push_str("# VENOM Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    let _ = writeln!(md, "| Source | {} |", meta.source);
    let _ = writeln!(md, "| Created | {} |", meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(md, "| Config Hash | {} |", meta.config_hash);
    let _ = writeln!(md, "| Dataset Hash | {} |", meta.dataset_hash);
    let _ = writeln!(
        md,
        "| Sampling | every {} bars, window {}, horizon buffer {} |",
        meta.harness.sampling_stride, meta.harness.window_len, meta.harness.horizon_buffer
    );
    if meta.synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    let _ = writeln!(md, "| Samples | {} |", r.samples);
    let _ = writeln!(md, "| Failed Samples | {} |", r.failed_samples);
    let _ = writeln!(md, "| Signals Generated | {} |", t.generated);
    let _ = writeln!(md, "| Resolved | {} |", t.resolved);
    let _ = writeln!(md, "| Unresolved | {} |", t.unresolved);
    let _ = writeln!(md, "| Wins | {} |", t.wins);
    let _ = writeln!(md, "| Losses | {} ({} timed out) |", t.losses, t.timeouts);
    let _ = writeln!(md, "| Win Rate | {} |", pct(t.win_rate()));
    let _ = writeln!(md, "| Profit Factor | {} |", profit_factor(t));
    let _ = writeln!(md, "| Net Pips | {:.1} |", t.total_pips());
    let _ = writeln!(md, "| Avg Pips | {:.2} |", t.avg_pips());
    let _ = writeln!(md, "| PnL | {:.2} |", t.total_pnl());
    md.push('\n');

    breakdown_table(&mut md, "Instrument", &r.by_instrument);
    breakdown_table(&mut md, "Session", &r.by_session);
    breakdown_table(&mut md, "Timeframe", &r.by_timeframe);
    breakdown_table(&mut md, "Regime", &r.by_regime);

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::reporting::RunMetadata;
    use crate::resolver::Outcome;
    use crate::result::{BacktestResult, TradeKey};
    use chrono::{TimeZone, Utc};
    use venom_core::{Regime, Session, TimeframeBucket};

    fn report() -> BacktestReport {
        let mut result = BacktestResult::default();
        let key = TradeKey {
            symbol: "EURUSD",
            session: Session::NewYork,
            timeframe: TimeframeBucket::Medium,
            regime: Regime::BreakoutPending,
        };
        result.samples = 10;
        result.record_generated(&key);
        result.record_outcome(&key, Outcome::Win, 20.0, 200.0);
        BacktestReport::new(
            RunMetadata {
                source: "venom".into(),
                created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                config_hash: "abc123".into(),
                dataset_hash: "def456".into(),
                synthetic: true,
                harness: HarnessConfig::default(),
            },
            result,
        )
    }

    #[test]
    fn report_has_summary_and_breakdowns() {
        let md = render_markdown(&report());
        assert!(md.contains("# VENOM Backtest Report"));
        assert!(md.contains("| Win Rate | 100.0% |"));
        assert!(md.contains("| Profit Factor | inf |"));
        assert!(md.contains("**SYNTHETIC**"));
        assert!(md.contains("## By Instrument"));
        assert!(md.contains("| new_york |"));
        assert!(md.contains("| medium |"));
        assert!(md.contains("| breakout_pending |"));
    }

    #[test]
    fn empty_breakdowns_are_omitted() {
        let mut r = report();
        r.result = BacktestResult::default();
        let md = render_markdown(&r);
        assert!(!md.contains("## By"));
        assert!(md.contains("| Profit Factor | n/a |"));
    }
}
