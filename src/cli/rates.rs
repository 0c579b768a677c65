use super::ui;
use crate::core::cache::RateStore;
use crate::core::currency::{RateProvider, RateTable};
use crate::core::fetcher::RateFetcher;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::Cell;
use std::collections::BTreeMap;

/// Ensures the cache holds rates for `dates` and renders them.
pub async fn show_rates<P, S>(
    fetcher: &RateFetcher<P, S>,
    dates: &[NaiveDate],
    local_currency: &str,
) -> Result<String>
where
    P: RateProvider,
    S: RateStore + 'static,
{
    let spinner = ui::new_spinner(&format!("Fetching rates for {} dates", dates.len()));
    let rates = fetcher.fetch(dates.iter().copied()).await;
    spinner.finish_and_clear();
    let rates = rates.context("Failed to fetch exchange rates")?;

    Ok(display_rates(&rates, local_currency))
}

fn display_rates(rates: &BTreeMap<NaiveDate, RateTable>, local_currency: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Base"),
        ui::header_cell(&format!("Rate ({local_currency})")),
        ui::header_cell("Currencies"),
    ]);

    for (date, rates) in rates {
        let local = rates.rate(local_currency).map_or_else(
            || ui::style_text("N/A", ui::StyleType::Subtle),
            |rate| format!("{rate:.4}"),
        );
        table.add_row(vec![
            Cell::new(date),
            Cell::new(&rates.base),
            ui::number_cell(local),
            ui::number_cell(rates.rates.len()),
        ]);
    }

    format!(
        "{}\n\n{}",
        ui::style_text("Exchange rates", ui::StyleType::Title),
        table
    )
}
