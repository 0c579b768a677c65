//! Error types for the exchange-rate subsystem.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching, persisting or applying exchange rates.
///
/// Every variant is fatal for the run that produced it: no partial
/// conversion or export happens after one of these.
#[derive(Debug, Error)]
pub enum RatesError {
    /// The provider failed to return a rate table for a date.
    #[error("Failed to fetch rates for {date}: {source}")]
    Fetch {
        date: NaiveDate,
        #[source]
        source: anyhow::Error,
    },

    /// The provider did not answer in time.
    #[error("Timed out after {after:?} fetching rates for {date}")]
    Timeout { date: NaiveDate, after: Duration },

    /// The rate cache could not be persisted.
    #[error("Failed to write rate cache to {}: {source}", .path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A transaction date has no rate table even though the fetch completed.
    #[error("No rate table for {date}; rates must be fetched before normalizing")]
    MissingRateTable { date: NaiveDate },

    /// The rate table has no factor for a currency.
    #[error("Rate table based on {base} has no rate for {code}")]
    UnknownCurrency { code: String, base: String },
}

pub type Result<T> = std::result::Result<T, RatesError>;

impl RatesError {
    /// The date this error is about, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            RatesError::Fetch { date, .. }
            | RatesError::Timeout { date, .. }
            | RatesError::MissingRateTable { date } => Some(*date),
            _ => None,
        }
    }
}
