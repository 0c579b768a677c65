//! Currency codes, daily rate tables and conversion between currencies.

use super::error::{RatesError, Result};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Legacy or source-specific codes and the ISO 4217 code they stand for.
const CURRENCY_ALIASES: &[(&str, &str)] = &[("NIS", "ILS")];

/// Decimal places kept for every monetary value.
pub const AMOUNT_PRECISION: u32 = 2;

/// Collapses a currency code to its canonical 3-letter form.
///
/// Codes are trimmed and upper-cased before aliases are resolved, so
/// `" nis"` and `"ILS"` both come back as `"ILS"`.
pub fn canonical_currency(code: &str) -> String {
    let code = code.trim().to_uppercase();
    CURRENCY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == code)
        .map_or(code, |(_, canonical)| (*canonical).to_string())
}

/// Conversion factors for one calendar date, relative to `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn new(base: impl Into<String>, rates: BTreeMap<String, f64>) -> Self {
        Self {
            base: base.into(),
            rates,
        }
    }

    /// Factor of `code` against the base. The base defaults to 1 when the
    /// table omits it.
    pub fn rate(&self, code: &str) -> Option<f64> {
        if code == self.base {
            return Some(self.rates.get(code).copied().unwrap_or(1.0));
        }
        self.rates
            .get(code)
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }

    fn require(&self, code: &str) -> Result<f64> {
        self.rate(code).ok_or_else(|| RatesError::UnknownCurrency {
            code: code.to_string(),
            base: self.base.clone(),
        })
    }
}

/// Rounds half up (toward positive infinity) to [`AMOUNT_PRECISION`] places,
/// so a charge of -0.125 becomes -0.12.
pub fn round_amount(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| {
            let strategy = if d.is_sign_negative() {
                RoundingStrategy::MidpointTowardZero
            } else {
                RoundingStrategy::MidpointAwayFromZero
            };
            d.round_dp_with_strategy(AMOUNT_PRECISION, strategy)
        })
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Converts `amount` from one currency to another through the table's base.
///
/// Missing and zero amounts yield `Ok(None)` rather than `0`, so "no amount"
/// stays distinguishable from an amount that converted to zero.
pub fn convert(
    amount: Option<f64>,
    table: &RateTable,
    from: &str,
    to: &str,
) -> Result<Option<f64>> {
    let Some(amount) = amount.filter(|a| *a != 0.0 && !a.is_nan()) else {
        return Ok(None);
    };

    if from == to {
        return Ok(Some(round_amount(amount)));
    }

    let in_base = amount / table.require(from)?;
    Ok(Some(round_amount(in_base * table.require(to)?)))
}

/// A remote source of historical daily rate tables.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn historical(&self, date: NaiveDate) -> AnyResult<RateTable>;
}
