//! VENOM core: market-structure analysis and trade-signal generation.
//!
//! The pipeline is a chain of pure functions over a trailing bar window:
//!
//! - [`structure`]: regime, support/resistance, volatility percentile,
//!   liquidity zones and structure-break probability
//! - [`scoring`]: direction and confidence
//! - [`timeframe`]: holding bucket and position-size multiplier
//! - [`levels`]: entry, stop, targets and invalidation
//! - [`assembler`]: composes the above into a [`Signal`]
//!
//! Every call takes an immutable [`EngineConfig`] by reference. Nothing is
//! cached between calls, so identical inputs always give identical outputs
//! and windows can be analysed from any number of threads.

pub mod assembler;
pub mod config;
pub mod domain;
pub mod fingerprint;
pub mod indicators;
pub mod levels;
pub mod scoring;
pub mod structure;
pub mod synthetic;
pub mod timeframe;

pub use assembler::{analyze, generate_signal, SignalEngine, SignalSource};
pub use config::{ConfigError, EngineConfig};
pub use domain::{Bar, BarError, Direction, Session, Signal, StrengthTier};
pub use structure::{MarketStructure, Regime};
pub use timeframe::TimeframeBucket;
