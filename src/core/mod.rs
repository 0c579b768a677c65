//! Core business logic: exchange rates, transactions and their conversion

pub mod cache;
pub mod calendar;
pub mod config;
pub mod currency;
pub mod error;
pub mod fetcher;
pub mod log;
pub mod normalize;
pub mod transaction;

// Re-export main types for cleaner imports
pub use cache::{RateCache, RateStore};
pub use calendar::DayZone;
pub use currency::{RateProvider, RateTable, canonical_currency, convert};
pub use error::RatesError;
pub use fetcher::{FetchOptions, RateFetcher};
pub use normalize::{normalize, required_dates};
pub use transaction::{Account, ConvertedTransaction, Transaction, TransactionMeta};
