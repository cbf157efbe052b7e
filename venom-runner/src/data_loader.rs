//! Bar loading for the harness.
//!
//! Two sources:
//! 1. CSV files, one per instrument, with columns
//!    `timestamp,open,high,low,close,volume[,session]`
//! 2. Seeded synthetic series (tagged as synthetic in reports)
//!
//! Timestamps are UTC, either RFC 3339 or `YYYY-MM-DD HH:MM[:SS]`. Rows must
//! be strictly increasing in time and pass the bar sanity check.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use venom_core::synthetic::{generate_bars, SeedHierarchy, SyntheticSpec};
use venom_core::{Bar, BarError, Session};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}: malformed CSV: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("{origin} line {line}: unrecognised timestamp '{value}'")]
    Timestamp {
        origin: String,
        line: u64,
        value: String,
    },

    #[error("{origin} line {line}: unknown session '{value}'")]
    Session {
        origin: String,
        line: u64,
        value: String,
    },

    #[error("{origin} line {line}: {source}")]
    InvalidBar {
        origin: String,
        line: u64,
        #[source]
        source: BarError,
    },

    #[error("{origin} line {line}: timestamp not after the previous row")]
    Unsorted { origin: String, line: u64 },

    #[error("{origin}: no bars")]
    Empty { origin: String },

    #[error("duplicate symbol '{0}' in input files")]
    DuplicateSymbol(String),
}

/// Bars for a set of instruments plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: BTreeMap<String, Vec<Bar>>,
    /// BLAKE3 over every bar, in symbol order.
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    session: Option<String>,
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y.%m.%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse bars from any CSV reader. `origin` names the source in errors.
pub fn read_bars<R: Read>(reader: R, origin: &str) -> Result<Vec<Bar>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<Bar> = Vec::new();

    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = i as u64 + 2;
        let row = row.map_err(|source| LoadError::Csv {
            origin: origin.to_string(),
            source,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            origin: origin.to_string(),
            line,
            value: row.timestamp.clone(),
        })?;
        let session = match row.session.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<Session>().map_err(|_| LoadError::Session {
                origin: origin.to_string(),
                line,
                value: s.to_string(),
            })?),
        };
        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            session,
        };
        bar.check().map_err(|source| LoadError::InvalidBar {
            origin: origin.to_string(),
            line,
            source,
        })?;
        if bars.last().is_some_and(|prev| prev.timestamp >= bar.timestamp) {
            return Err(LoadError::Unsorted {
                origin: origin.to_string(),
                line,
            });
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(bars)
}

/// Load one CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_bars(file, &path.display().to_string())
}

/// Instrument symbol for a data file: the upper-cased file stem.
pub fn symbol_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_ascii_uppercase())
        .unwrap_or_default()
}

/// Load several CSV files, one instrument each.
pub fn load_files(paths: &[PathBuf]) -> Result<LoadedData, LoadError> {
    let mut bars = BTreeMap::new();
    for path in paths {
        let symbol = symbol_from_path(path);
        let series = load_csv(path)?;
        tracing::info!(symbol = %symbol, bars = series.len(), path = %path.display(), "loaded bars");
        if bars.insert(symbol.clone(), series).is_some() {
            return Err(LoadError::DuplicateSymbol(symbol));
        }
    }
    let dataset_hash = compute_dataset_hash(&bars);
    Ok(LoadedData {
        bars,
        dataset_hash,
        synthetic: false,
    })
}

/// Generate synthetic bars for each symbol from one master seed.
///
/// Each symbol's series depends only on `(seed, symbol)`.
pub fn synthetic_data(symbols: &[String], seed: u64, spec: &SyntheticSpec) -> LoadedData {
    let seeds = SeedHierarchy::new(seed);
    let bars: BTreeMap<String, Vec<Bar>> = symbols
        .iter()
        .map(|symbol| {
            let mut rng = seeds.rng_for(symbol, 0);
            (symbol.clone(), generate_bars(&mut rng, spec))
        })
        .collect();
    tracing::warn!(
        symbols = symbols.len(),
        seed,
        "using synthetic data; results are tagged as synthetic"
    );
    let dataset_hash = compute_dataset_hash(&bars);
    LoadedData {
        bars,
        dataset_hash,
        synthetic: true,
    }
}

/// Deterministic BLAKE3 hash over all bars, in symbol order.
pub fn compute_dataset_hash(bars: &BTreeMap<String, Vec<Bar>>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, series) in bars {
        hasher.update(symbol.as_bytes());
        for bar in series {
            hasher.update(&bar.timestamp.timestamp().to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Write bars as CSV in the format [`read_bars`] accepts.
pub fn write_bars<W: Write>(writer: W, bars: &[Bar]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume", "session"])?;
    for b in bars {
        wtr.write_record([
            b.timestamp.to_rfc3339(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
            b.session.map(|s| s.label().to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
