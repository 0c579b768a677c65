pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::fetcher::RateFetcher;
use crate::providers::OpenExchangeRatesProvider;
use crate::store::JsonFileStore;
use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    /// Convert a scrape result file and export it as CSV
    Convert {
        input: PathBuf,
        scraper: Option<String>,
    },
    /// Fetch and show rates for the given dates
    Rates { dates: Vec<NaiveDate> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("bankcsv starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(local_currency = %config.local_currency, "Loaded config");

    let provider = OpenExchangeRatesProvider::new(
        &config.providers.open_exchange_rates.base_url,
        config.app_id().as_deref(),
    )?;
    let store = JsonFileStore::new(config.rates_cache_path()?);
    let fetcher = RateFetcher::load(provider, store, config.fetch_options()).await;

    match command {
        AppCommand::Convert { input, scraper } => {
            let scraper = scraper.unwrap_or_else(|| {
                input
                    .file_stem()
                    .map_or_else(|| "scrape".to_string(), |s| s.to_string_lossy().into_owned())
            });
            let exports =
                cli::convert::convert_scrape(&config, &fetcher, &input, &scraper).await?;
            println!(
                "{}",
                cli::convert::display_exports(&exports, &config.local_currency)
            );
        }
        AppCommand::Rates { dates } => {
            let output = cli::rates::show_rates(&fetcher, &dates, &config.local_currency).await?;
            println!("{output}");
        }
    }

    Ok(())
}
