//! VENOM runner: backtest harness, statistics and reports.
//!
//! This crate builds on `venom-core` to provide:
//! - CSV and synthetic bar loading with dataset hashing
//! - First-touch signal resolution with a stop-first tie-break
//! - Mergeable per-instrument, per-session, per-timeframe and per-regime statistics
//! - Parallel replay over instruments
//! - Markdown, JSON and CSV reports
//! - Logging setup for binaries

pub mod config;
pub mod data_loader;
pub mod harness;
pub mod reporting;
pub mod resolver;
pub mod result;
pub mod telemetry;

pub use config::{HarnessConfig, HarnessError, RunConfig};
pub use data_loader::{load_csv, load_files, synthetic_data, LoadError, LoadedData};
pub use harness::{replay_instrument, run_backtest, BacktestRun, SampleError};
pub use reporting::{BacktestReport, RunMetadata};
pub use resolver::{resolve, Outcome, Resolution};
pub use result::{BacktestResult, Tally, TradeRecord, SCHEMA_VERSION};
pub use telemetry::{init_logging, LogFormat};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<BacktestRun>();
        assert_sync::<BacktestRun>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<HarnessConfig>();
        assert_sync::<HarnessConfig>();
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
    }

    #[test]
    fn report_is_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
    }
}
