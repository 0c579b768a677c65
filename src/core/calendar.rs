//! Calendar days of scraped timestamps.
//!
//! Scrapers report local midnight as an instant (Israeli midnight arrives as
//! `...T22:00:00.000Z`), so the day a transaction belongs to depends on the
//! zone it is read in, not on the offset it was serialized with.

use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// Zone whose midnight separates transaction days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayZone {
    /// The zone of the machine running the export.
    #[default]
    Local,
    /// An IANA zone such as `Asia/Jerusalem`.
    Named(Tz),
}

impl DayZone {
    /// Calendar day of `instant` in this zone.
    pub fn day_of(&self, instant: &DateTime<FixedOffset>) -> NaiveDate {
        match self {
            DayZone::Local => instant.with_timezone(&Local).date_naive(),
            DayZone::Named(tz) => instant.with_timezone(tz).date_naive(),
        }
    }
}

impl FromStr for DayZone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(DayZone::Local);
        }
        s.parse::<Tz>()
            .map(DayZone::Named)
            .map_err(|_| anyhow!("invalid timezone: {s}"))
    }
}

impl fmt::Display for DayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayZone::Local => f.write_str("local"),
            DayZone::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}
