//! Accounts and transactions as produced by the bank scraper, and their
//! converted counterparts.

use super::calendar::DayZone;
use super::currency::canonical_currency;
use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Normal,
    Installments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installments {
    pub number: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type", default)]
    pub kind: TransactionType,
    pub date: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_date: Option<DateTime<FixedOffset>>,
    /// Bank reference; some scrapers report it as a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<serde_json::Value>,
    pub original_amount: Option<f64>,
    pub original_currency: String,
    pub charged_amount: Option<f64>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<Installments>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Transaction {
    /// The calendar day whose rate table applies to this transaction. The
    /// same day is used as the booking date of the exported row.
    pub fn rate_date(&self, zone: &DayZone) -> NaiveDate {
        zone.day_of(&self.date)
    }

    pub fn with_canonical_currency(self) -> Self {
        let original_currency = canonical_currency(&self.original_currency);
        Self {
            original_currency,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account<T = Transaction> {
    pub account_number: String,
    #[serde(rename = "txns", alias = "transactions")]
    pub transactions: Vec<T>,
}

/// Amounts and currency of a transaction before it was converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalAmounts {
    pub original_currency: String,
    pub charged_amount: Option<f64>,
    pub original_amount: Option<f64>,
}

impl From<&Transaction> for OriginalAmounts {
    fn from(txn: &Transaction) -> Self {
        Self {
            original_currency: txn.original_currency.clone(),
            charged_amount: txn.charged_amount,
            original_amount: txn.original_amount,
        }
    }
}

/// Conversion audit data. `original` is present exactly when the
/// transaction was converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionMeta {
    converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    original: Option<OriginalAmounts>,
}

impl TransactionMeta {
    pub fn local() -> Self {
        Self {
            converted: false,
            original: None,
        }
    }

    pub fn converted(original: OriginalAmounts) -> Self {
        Self {
            converted: true,
            original: Some(original),
        }
    }

    pub fn is_converted(&self) -> bool {
        self.converted
    }

    pub fn original(&self) -> Option<&OriginalAmounts> {
        self.original.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub meta: TransactionMeta,
}

/// Output of a scraper run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    #[serde(default)]
    pub accounts: Vec<Account>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl ScrapeResult {
    /// Accounts of a successful scrape, with every currency code canonicalised.
    pub fn into_accounts(self) -> Result<Vec<Account>> {
        if !self.success {
            bail!(
                "Scrape failed ({}): {}",
                self.error_type.as_deref().unwrap_or("unknown"),
                self.error_message.as_deref().unwrap_or("no error message")
            );
        }

        Ok(self
            .accounts
            .into_iter()
            .map(|account| Account {
                account_number: account.account_number,
                transactions: account
                    .transactions
                    .into_iter()
                    .map(Transaction::with_canonical_currency)
                    .collect(),
            })
            .collect())
    }
}
