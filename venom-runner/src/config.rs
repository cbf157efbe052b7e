//! Harness and run configuration.
//!
//! A run file is TOML with two tables:
//!
//! ```toml
//! [engine]        # venom_core::EngineConfig, every field optional
//! [harness]       # HarnessConfig, every field optional
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use venom_core::{ConfigError, EngineConfig};

/// Errors from configuring or starting a backtest.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid harness config: {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("engine config: {0}")]
    Engine(#[from] ConfigError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn invalid(field: &str, reason: impl Into<String>) -> HarnessError {
    HarnessError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Replay parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Bars between consecutive sample points.
    pub sampling_stride: usize,
    /// Trailing window length handed to the signal source.
    pub window_len: usize,
    /// Extra bars scanned beyond a signal's expected duration.
    pub horizon_buffer: usize,
    /// Replay instruments on a rayon pool.
    pub parallel: bool,
    /// Dedicated pool size. `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Pip size for symbols without an explicit entry.
    pub default_pip_size: f64,
    /// Account-currency value of one pip at size multiplier 1.0.
    pub pip_value: f64,
    /// Per-symbol pip sizes.
    pub pip_sizes: BTreeMap<String, f64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sampling_stride: 4,
            window_len: 100,
            horizon_buffer: 12,
            parallel: true,
            threads: None,
            default_pip_size: 0.0001,
            pip_value: 10.0,
            pip_sizes: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    /// Pip size for `symbol`: explicit entry, then `0.01` for yen crosses,
    /// then the default.
    pub fn pip_size(&self, symbol: &str) -> f64 {
        if let Some(&p) = self.pip_sizes.get(symbol) {
            return p;
        }
        if symbol.to_ascii_uppercase().ends_with("JPY") {
            return 0.01;
        }
        self.default_pip_size
    }

    /// Forward bars scanned for a signal expecting `expected_bars`.
    pub fn horizon(&self, expected_bars: usize) -> usize {
        expected_bars.saturating_add(self.horizon_buffer)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.sampling_stride == 0 {
            return Err(invalid("harness.sampling_stride", "must be >= 1"));
        }
        if self.window_len == 0 {
            return Err(invalid("harness.window_len", "must be >= 1"));
        }
        if self.threads == Some(0) {
            return Err(invalid("harness.threads", "must be >= 1 when set"));
        }
        if !(self.default_pip_size.is_finite() && self.default_pip_size > 0.0) {
            return Err(invalid("harness.default_pip_size", "must be positive"));
        }
        if !(self.pip_value.is_finite() && self.pip_value >= 0.0) {
            return Err(invalid("harness.pip_value", "must be non-negative"));
        }
        for (symbol, &p) in &self.pip_sizes {
            if !(p.is_finite() && p > 0.0) {
                return Err(invalid(&format!("harness.pip_sizes.{symbol}"), "must be positive"));
            }
        }
        Ok(())
    }
}

/// A complete run file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub harness: HarnessConfig,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, HarnessError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        self.engine.validate()?;
        self.harness.validate()?;
        if self.harness.window_len < self.engine.structure.min_bars {
            return Err(invalid(
                "harness.window_len",
                format!(
                    "must be at least engine.structure.min_bars ({})",
                    self.engine.structure.min_bars
                ),
            ));
        }
        Ok(())
    }
}
