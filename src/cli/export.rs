//! CSV files for budgeting software, one per account.

use crate::core::calendar::DayZone;
use crate::core::transaction::{Account, ConvertedTransaction, TransactionType};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADER: [&str; 6] = ["Date", "Payee", "Inflow", "Installment", "Total", "Memo"];

/// How converted transactions are laid out in the exported rows.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Book installment purchases at their full price.
    pub combine_installments: bool,
    /// Zone whose calendar day is written to the `Date` column.
    pub zone: DayZone,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    payee: &'a str,
    inflow: Option<String>,
    installment: Option<u32>,
    total: Option<u32>,
    memo: String,
}

fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Picks the amount that hits the budget for a transaction.
///
/// Installment purchases are booked at their full price when installments
/// are combined, and at the monthly charge otherwise.
fn inflow_of(
    kind: TransactionType,
    charged: Option<f64>,
    original: Option<f64>,
    combine_installments: bool,
) -> Option<f64> {
    if kind == TransactionType::Installments && combine_installments {
        original
    } else {
        charged
    }
}

fn to_row<'a>(txn: &'a ConvertedTransaction, options: &ExportOptions) -> CsvRow<'a> {
    let inner = &txn.transaction;
    let combine_installments = options.combine_installments;
    let inflow = inflow_of(
        inner.kind,
        inner.charged_amount,
        inner.original_amount,
        combine_installments,
    );

    let memo = txn
        .meta
        .original()
        .and_then(|original| {
            inflow_of(
                inner.kind,
                original.charged_amount,
                original.original_amount,
                combine_installments,
            )
            .map(|amount| format!("{} {}", format_amount(amount), original.original_currency))
        })
        .unwrap_or_default();

    CsvRow {
        date: inner.rate_date(&options.zone).format("%d/%m/%Y").to_string(),
        payee: &inner.description,
        inflow: inflow.map(format_amount),
        installment: inner.installments.map(|i| i.number),
        total: inner.installments.map(|i| i.total),
        memo,
    }
}

pub fn export_file_name(scraper: &str, account_number: &str) -> String {
    format!("{scraper} ({account_number}).csv")
}

/// Writes one account as a BOM-prefixed CSV document. The header row is
/// written even when the account has no transactions.
pub fn write_account_csv<W: Write>(
    mut writer: W,
    account: &Account<ConvertedTransaction>,
    options: &ExportOptions,
) -> Result<()> {
    writer.write_all(UTF8_BOM)?;
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(HEADER)?;
    for txn in &account.transactions {
        csv.serialize(to_row(txn, options))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes every account to `dir` and returns the created paths.
pub fn export_accounts(
    dir: &Path,
    scraper: &str,
    accounts: &[Account<ConvertedTransaction>],
    options: &ExportOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    accounts
        .iter()
        .map(|account| {
            let path = dir.join(export_file_name(scraper, &account.account_number));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_account_csv(BufWriter::new(file), account, options)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!(path = %path.display(), rows = account.transactions.len(), "Exported account");
            Ok(path)
        })
        .collect()
}
