//! Bar: one OHLCV observation for an instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Session;

/// Reasons a bar fails the sanity check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar at {0} has a non-finite OHLC value")]
    NonFinite(DateTime<Utc>),
    #[error("bar at {0} has inconsistent OHLC (high {1} < low {2})")]
    Inverted(DateTime<Utc>, f64, f64),
    #[error("bar at {0} has a non-positive price")]
    NonPositive(DateTime<Utc>),
}

/// OHLCV bar for a single instrument.
///
/// Bars are owned by the caller and never mutated by the engine; every
/// analysis call borrows a window (`&[Bar]`) of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Trading session label, if the data source supplied one.
    #[serde(default)]
    pub session: Option<Session>,
}

impl Bar {
    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, prices positive.
    pub fn is_sane(&self) -> bool {
        self.check().is_ok()
    }

    /// Like [`Bar::is_sane`] but reports which rule was broken.
    pub fn check(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::NonFinite(self.timestamp));
        }
        if self.low <= 0.0 || self.open <= 0.0 || self.close <= 0.0 {
            return Err(BarError::NonPositive(self.timestamp));
        }
        let consistent = self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close;
        if !consistent {
            return Err(BarError::Inverted(self.timestamp, self.high, self.low));
        }
        Ok(())
    }

    /// Session label if present, otherwise derived from the UTC hour.
    pub fn effective_session(&self) -> Session {
        self.session
            .unwrap_or_else(|| Session::from_timestamp(&self.timestamp))
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
