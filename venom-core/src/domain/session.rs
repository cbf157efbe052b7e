//! Trading sessions.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading session a bar belongs to.
///
/// Sessions follow the FX clock in UTC: Asian 00–07, London 07–12,
/// London/New York overlap 12–16, New York 16–21, off-hours 21–24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Asian,
    London,
    Overlap,
    NewYork,
    OffHours,
}

impl Session {
    pub const ALL: [Session; 5] = [
        Session::Asian,
        Session::London,
        Session::Overlap,
        Session::NewYork,
        Session::OffHours,
    ];

    /// Derive the session from an hour of the day in UTC (0–23).
    pub fn from_utc_hour(hour: u32) -> Self {
        match hour {
            0..=6 => Session::Asian,
            7..=11 => Session::London,
            12..=15 => Session::Overlap,
            16..=20 => Session::NewYork,
            _ => Session::OffHours,
        }
    }

    pub fn from_timestamp(ts: &DateTime<Utc>) -> Self {
        Self::from_utc_hour(ts.hour())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Session::Asian => "asian",
            Session::London => "london",
            Session::Overlap => "overlap",
            Session::NewYork => "new_york",
            Session::OffHours => "off_hours",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Session {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "asian" | "asia" | "tokyo" | "sydney" => Ok(Session::Asian),
            "london" | "europe" => Ok(Session::London),
            "overlap" | "london_new_york" | "london_ny" => Ok(Session::Overlap),
            "new_york" | "newyork" | "ny" => Ok(Session::NewYork),
            "off_hours" | "offhours" | "closed" => Ok(Session::OffHours),
            other => Err(format!("unknown session label: {other}")),
        }
    }
}
