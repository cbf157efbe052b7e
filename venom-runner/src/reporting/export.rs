//! JSON and CSV export, and the on-disk report bundle.
//!
//! Persisted reports carry `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::result::{TradeRecord, SCHEMA_VERSION};

use super::{render_markdown, BacktestReport};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &BacktestReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize backtest report to JSON")
}

/// Parse a report, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<BacktestReport> {
    let report: BacktestReport =
        serde_json::from_str(json).context("failed to deserialize backtest report")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

/// Trade tape as CSV, one row per generated signal.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "index",
        "generated_at",
        "exit_at",
        "direction",
        "regime",
        "timeframe",
        "session",
        "confidence",
        "entry",
        "stop",
        "target1",
        "risk_reward",
        "size_multiplier",
        "outcome",
        "exit_price",
        "bars_held",
        "pips",
        "pnl",
        "ambiguous",
    ])?;

    for t in trades {
        let outcome = match t.outcome {
            Some(o) => serde_json::to_value(o)?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            None => "unresolved".to_string(),
        };
        wtr.write_record([
            t.symbol.clone(),
            t.index.to_string(),
            t.generated_at.to_rfc3339(),
            t.exit_at.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
            t.direction.to_string(),
            t.regime.to_string(),
            t.timeframe.to_string(),
            t.session.to_string(),
            format!("{:.2}", t.confidence),
            format!("{:.6}", t.entry),
            format!("{:.6}", t.stop),
            format!("{:.6}", t.target1),
            format!("{:.3}", t.risk_reward),
            format!("{:.3}", t.position_size_multiplier),
            outcome,
            opt_f64(t.exit_price),
            t.bars_held.to_string(),
            format!("{:.1}", t.pips),
            format!("{:.2}", t.pnl),
            t.ambiguous.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Bundle ─────────────────────────────────────────────────────────

/// Write `report.md`, `report.json` and `trades.csv` into a new
/// `backtest_{timestamp}/` directory under `output_dir`.
///
/// Returns the created directory.
pub fn save_report(
    report: &BacktestReport,
    trades: &[TradeRecord],
    output_dir: &Path,
) -> Result<PathBuf> {
    let dirname = format!(
        "backtest_{}",
        report.metadata.created_at.format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

    let md_path = run_dir.join("report.md");
    std::fs::write(&md_path, render_markdown(report))
        .with_context(|| format!("failed to write {}", md_path.display()))?;

    let json_path = run_dir.join("report.json");
    std::fs::write(&json_path, export_json(report)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    let csv_path = run_dir.join("trades.csv");
    std::fs::write(&csv_path, export_trades_csv(trades)?)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;

    tracing::info!(dir = %run_dir.display(), trades = trades.len(), "report saved");
    Ok(run_dir)
}

/// Load `report.json` from a bundle written by [`save_report`].
pub fn load_report(dir: &Path) -> Result<BacktestReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
