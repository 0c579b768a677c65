//! Rewrites scraped transactions into the local currency.

use super::calendar::DayZone;
use super::currency::{RateTable, canonical_currency, convert};
use super::error::{RatesError, Result};
use super::transaction::{
    Account, ConvertedTransaction, OriginalAmounts, Transaction, TransactionMeta,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Dates whose rate tables are needed to convert `accounts`, as days of
/// `zone`.
pub fn required_dates(
    accounts: &[Account],
    local_currency: &str,
    zone: &DayZone,
) -> BTreeSet<NaiveDate> {
    let local_currency = canonical_currency(local_currency);
    accounts
        .iter()
        .flat_map(|account| &account.transactions)
        .filter(|txn| canonical_currency(&txn.original_currency) != local_currency)
        .map(|txn| txn.rate_date(zone))
        .collect()
}

/// Converts every foreign-currency transaction of `accounts` into
/// `local_currency` using the rate table of its day.
///
/// Fails on the first transaction that cannot be converted; no partial
/// result is returned.
pub fn normalize(
    accounts: &[Account],
    rates: &BTreeMap<NaiveDate, RateTable>,
    local_currency: &str,
    zone: &DayZone,
) -> Result<Vec<Account<ConvertedTransaction>>> {
    let local_currency = canonical_currency(local_currency);
    accounts
        .iter()
        .map(|account| {
            let transactions = account
                .transactions
                .iter()
                .map(|txn| normalize_transaction(txn, rates, &local_currency, zone))
                .collect::<Result<Vec<_>>>()?;
            Ok(Account {
                account_number: account.account_number.clone(),
                transactions,
            })
        })
        .collect()
}

fn normalize_transaction(
    txn: &Transaction,
    rates: &BTreeMap<NaiveDate, RateTable>,
    local_currency: &str,
    zone: &DayZone,
) -> Result<ConvertedTransaction> {
    let currency = canonical_currency(&txn.original_currency);

    if currency == local_currency {
        return Ok(ConvertedTransaction {
            transaction: Transaction {
                original_currency: currency,
                ..txn.clone()
            },
            meta: TransactionMeta::local(),
        });
    }

    let date = txn.rate_date(zone);
    let table = rates
        .get(&date)
        .ok_or(RatesError::MissingRateTable { date })?;

    let charged_amount = convert(txn.charged_amount, table, &currency, local_currency)?;
    let original_amount = convert(txn.original_amount, table, &currency, local_currency)?;

    Ok(ConvertedTransaction {
        transaction: Transaction {
            original_currency: currency,
            charged_amount,
            original_amount,
            ..txn.clone()
        },
        meta: TransactionMeta::converted(OriginalAmounts::from(txn)),
    })
}
