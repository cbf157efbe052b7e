//! VENOM CLI: structure analysis, signal generation, synthetic data and
//! backtests.
//!
//! Commands:
//! - `analyze`: market structure of the trailing window of a CSV file
//! - `signal`: signal (if any) for the latest bar of a CSV file
//! - `synth`: write seeded synthetic bars as CSV
//! - `backtest`: replay the engine over CSV files or synthetic data

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use venom_core::fingerprint::{config_hash, short_hash};
use venom_core::synthetic::SyntheticSpec;
use venom_core::{Bar, Session, SignalEngine, SignalSource};
use venom_runner::data_loader::{symbol_from_path, write_bars};
use venom_runner::reporting::{render_markdown, save_report};
use venom_runner::{
    init_logging, load_csv, load_files, run_backtest, synthetic_data, BacktestReport, LoadedData,
    LogFormat, RunConfig, RunMetadata,
};

#[derive(Parser)]
#[command(
    name = "venom",
    version,
    about = "VENOM market-structure signal engine and backtester"
)]
struct Cli {
    /// Run config TOML with [engine] and [harness] tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (RUST_LOG overrides).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the market structure of a bar window as JSON.
    Analyze {
        /// CSV file of bars.
        #[arg(long)]
        data: PathBuf,

        /// Window length. Defaults to the harness window length.
        #[arg(long)]
        window: Option<usize>,

        /// Index of the last bar in the window. Defaults to the final bar.
        #[arg(long)]
        at: Option<usize>,
    },
    /// Generate a signal for the latest bar of a window.
    Signal {
        /// CSV file of bars.
        #[arg(long)]
        data: PathBuf,

        /// Symbol. Defaults to the file name.
        #[arg(long)]
        symbol: Option<String>,

        /// Session override (asian, london, overlap, new_york, off_hours).
        #[arg(long)]
        session: Option<Session>,

        /// Window length. Defaults to the harness window length.
        #[arg(long)]
        window: Option<usize>,

        /// Index of the last bar in the window. Defaults to the final bar.
        #[arg(long)]
        at: Option<usize>,

        /// Print the signal as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write seeded synthetic bars as CSV, one file per symbol.
    Synth {
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value_t = 2_000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
    },
    /// Replay the engine over historical or synthetic bars.
    Backtest {
        /// CSV files, one instrument each (symbol = file name).
        #[arg(long, num_args = 1..)]
        data: Vec<PathBuf>,

        /// Generate synthetic data for these symbols instead of loading files.
        #[arg(long, num_args = 1.., conflicts_with = "data")]
        synthetic: Vec<String>,

        /// Bars per synthetic symbol.
        #[arg(long, default_value_t = 5_000)]
        bars: usize,

        /// Master seed for synthetic data.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Override the harness sampling stride.
        #[arg(long)]
        stride: Option<usize>,

        /// Override the harness window length.
        #[arg(long)]
        window: Option<usize>,

        /// Worker threads (dedicated pool).
        #[arg(long)]
        threads: Option<usize>,

        /// Replay instruments one at a time.
        #[arg(long, default_value_t = false)]
        serial: bool,

        /// Directory for report.md, report.json and trades.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;
    let config = load_run_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { data, window, at } => run_analyze(&config, &data, window, at),
        Commands::Signal {
            data,
            symbol,
            session,
            window,
            at,
            json,
        } => run_signal(&config, &data, symbol, session, window, at, json),
        Commands::Synth {
            symbols,
            bars,
            seed,
            output_dir,
        } => run_synth(&symbols, bars, seed, &output_dir),
        Commands::Backtest {
            data,
            synthetic,
            bars,
            seed,
            stride,
            window,
            threads,
            serial,
            output_dir,
        } => {
            let mut config = config;
            if let Some(s) = stride {
                config.harness.sampling_stride = s;
            }
            if let Some(w) = window {
                config.harness.window_len = w;
            }
            if threads.is_some() {
                config.harness.threads = threads;
            }
            if serial {
                config.harness.parallel = false;
            }
            config.validate().context("invalid configuration")?;

            let loaded = if !synthetic.is_empty() {
                let spec = SyntheticSpec { bars, ..Default::default() };
                synthetic_data(&synthetic, seed, &spec)
            } else if !data.is_empty() {
                load_files(&data)?
            } else {
                bail!("backtest needs --data FILES or --synthetic SYMBOLS");
            };
            run_backtest_command(&config, loaded, &output_dir)
        }
    }
}

fn load_run_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(p) => RunConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(RunConfig::default()),
    }
}

/// Trailing window of `len` bars ending at `at` (default: last bar).
fn select_window(bars: &[Bar], len: usize, at: Option<usize>) -> Result<&[Bar]> {
    let end = match at {
        Some(i) if i >= bars.len() => bail!("--at {i} is past the last bar ({})", bars.len() - 1),
        Some(i) => i + 1,
        None => bars.len(),
    };
    Ok(&bars[end.saturating_sub(len)..end])
}

fn run_analyze(
    config: &RunConfig,
    data: &Path,
    window: Option<usize>,
    at: Option<usize>,
) -> Result<()> {
    let bars = load_csv(data)?;
    let len = window.unwrap_or(config.harness.window_len);
    let window = select_window(&bars, len, at)?;
    let structure = venom_core::analyze(window, &config.engine);
    println!("{}", serde_json::to_string_pretty(&structure)?);
    Ok(())
}

fn run_signal(
    config: &RunConfig,
    data: &Path,
    symbol: Option<String>,
    session: Option<Session>,
    window: Option<usize>,
    at: Option<usize>,
    json: bool,
) -> Result<()> {
    let bars = load_csv(data)?;
    let symbol = symbol.unwrap_or_else(|| symbol_from_path(data));
    let len = window.unwrap_or(config.harness.window_len);
    let window = select_window(&bars, len, at)?;

    let engine = SignalEngine::new(config.engine.clone());
    match engine.generate(&symbol, window, session) {
        Some(signal) if json => println!("{}", serde_json::to_string_pretty(&signal)?),
        Some(signal) => {
            println!("{signal}");
            println!(
                "  invalidation {:.5} | size x{:.2} | {} bars",
                signal.invalidation, signal.position_size_multiplier, signal.expected_bars
            );
            println!("  {}", signal.rationale);
        }
        None if json => println!("null"),
        None => println!("{symbol}: no signal"),
    }
    Ok(())
}

fn run_synth(symbols: &[String], bars: usize, seed: u64, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let spec = SyntheticSpec { bars, ..Default::default() };
    let loaded = synthetic_data(symbols, seed, &spec);
    for (symbol, series) in &loaded.bars {
        let path = output_dir.join(format!("{symbol}.csv"));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_bars(file, series).with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} ({} bars)", path.display(), series.len());
    }
    Ok(())
}

fn run_backtest_command(config: &RunConfig, loaded: LoadedData, output_dir: &Path) -> Result<()> {
    let engine = SignalEngine::new(config.engine.clone());
    let hash = config_hash(&config.engine).context("failed to hash engine config")?;
    tracing::info!(
        config_hash = short_hash(&hash),
        dataset_hash = short_hash(&loaded.dataset_hash),
        instruments = loaded.bars.len(),
        "running backtest"
    );

    let run = run_backtest(&engine, &loaded.bars, &config.harness)?;
    let report = BacktestReport::new(
        RunMetadata {
            source: engine.name().to_string(),
            created_at: chrono::Utc::now(),
            config_hash: hash,
            dataset_hash: loaded.dataset_hash,
            synthetic: loaded.synthetic,
            harness: config.harness.clone(),
        },
        run.result,
    );

    let dir = save_report(&report, &run.trades, output_dir)?;
    println!("{}", render_markdown(&report));
    println!("Report saved to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64);
                Bar {
                    timestamp: ts,
                    open: 1.0,
                    high: 1.1,
                    low: 0.9,
                    close: 1.0,
                    volume: 100.0,
                    session: None,
                }
            })
            .collect()
    }

    #[test]
    fn window_ends_at_requested_bar() {
        let bars = bars(10);
        let w = select_window(&bars, 4, Some(5)).unwrap();
        assert_eq!(w.len(), 4);
        assert_eq!(w.last().unwrap().timestamp, bars[5].timestamp);

        let tail = select_window(&bars, 4, None).unwrap();
        assert_eq!(tail.last().unwrap().timestamp, bars[9].timestamp);
    }

    #[test]
    fn window_is_clipped_at_series_start() {
        let bars = bars(3);
        assert_eq!(select_window(&bars, 100, None).unwrap().len(), 3);
        assert!(select_window(&bars, 2, Some(3)).is_err());
    }

    #[test]
    fn cli_parses_backtest_overrides() {
        let cli = Cli::try_parse_from([
            "venom", "--log-format", "json", "backtest", "--synthetic", "EURUSD", "USDJPY",
            "--stride", "8", "--threads", "2",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Backtest { synthetic, stride, threads, .. } => {
                assert_eq!(synthetic, vec!["EURUSD", "USDJPY"]);
                assert_eq!(stride, Some(8));
                assert_eq!(threads, Some(2));
            }
            _ => panic!("expected backtest"),
        }
    }

    #[test]
    fn data_and_synthetic_conflict() {
        let parsed = Cli::try_parse_from([
            "venom", "backtest", "--data", "a.csv", "--synthetic", "EURUSD",
        ]);
        assert!(parsed.is_err());
    }
}
