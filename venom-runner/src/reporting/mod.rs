//! Report rendering and export.
//!
//! A [`BacktestReport`] wraps the mergeable [`BacktestResult`] with the
//! metadata needed to reproduce the run. It renders to Markdown and JSON;
//! the trade tape exports as CSV.

pub mod export;
pub mod markdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::result::{BacktestResult, SCHEMA_VERSION};

pub use export::{export_json, export_trades_csv, import_json, save_report};
pub use markdown::render_markdown;

/// Provenance of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub source: String,
    pub created_at: DateTime<Utc>,
    /// BLAKE3 of the engine config.
    pub config_hash: String,
    /// BLAKE3 of every input bar.
    pub dataset_hash: String,
    pub synthetic: bool,
    pub harness: HarnessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub schema_version: u32,
    pub metadata: RunMetadata,
    pub result: BacktestResult,
}

impl BacktestReport {
    pub fn new(metadata: RunMetadata, result: BacktestResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            metadata,
            result,
        }
    }
}
