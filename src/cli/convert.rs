use super::export::{self, ExportOptions};
use super::ui;
use crate::core::cache::RateStore;
use crate::core::config::AppConfig;
use crate::core::currency::RateProvider;
use crate::core::fetcher::RateFetcher;
use crate::core::normalize::{normalize, required_dates};
use crate::core::transaction::ScrapeResult;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AccountExport {
    pub account_number: String,
    pub transactions: usize,
    pub converted: usize,
    pub path: PathBuf,
}

/// Scrape result file to CSV files: fetches the missing rates, converts every
/// account and only then writes the output.
pub async fn convert_scrape<P, S>(
    config: &AppConfig,
    fetcher: &RateFetcher<P, S>,
    input: &Path,
    scraper: &str,
) -> Result<Vec<AccountExport>>
where
    P: RateProvider,
    S: RateStore + 'static,
{
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read scrape result: {}", input.display()))?;
    let scrape: ScrapeResult = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse scrape result: {}", input.display()))?;
    let accounts = scrape.into_accounts()?;
    info!(accounts = accounts.len(), "Loaded scrape result");

    let zone = config.day_zone()?;
    let dates = required_dates(&accounts, &config.local_currency, &zone);
    debug!(dates = dates.len(), "Rates required");

    let spinner = ui::new_spinner(&format!("Fetching rates for {} dates", dates.len()));
    let rates = fetcher.fetch(dates).await;
    spinner.finish_and_clear();
    let rates = rates.context("Failed to fetch exchange rates")?;

    let normalized = normalize(&accounts, &rates, &config.local_currency, &zone)
        .context("Failed to convert transactions")?;

    let options = ExportOptions {
        combine_installments: config.combine_installments,
        zone,
    };
    let paths = export::export_accounts(&config.download_dir(), scraper, &normalized, &options)?;

    Ok(normalized
        .iter()
        .zip(paths)
        .map(|(account, path)| AccountExport {
            account_number: account.account_number.clone(),
            transactions: account.transactions.len(),
            converted: account
                .transactions
                .iter()
                .filter(|txn| txn.meta.is_converted())
                .count(),
            path,
        })
        .collect())
}

pub fn display_exports(exports: &[AccountExport], local_currency: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Account"),
        ui::header_cell("Transactions"),
        ui::header_cell(&format!("Converted to {local_currency}")),
        ui::header_cell("File"),
    ]);

    for account in exports {
        table.add_row(vec![
            Cell::new(&account.account_number),
            ui::number_cell(account.transactions),
            ui::number_cell(account.converted),
            Cell::new(account.path.display()),
        ]);
    }

    format!(
        "{}\n\n{}\n\n{} csv files saved",
        ui::style_text("Export", ui::StyleType::Title),
        table,
        ui::style_text(&exports.len().to_string(), ui::StyleType::TotalLabel)
    )
}
