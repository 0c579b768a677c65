use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::core::currency::{RateProvider, RateTable};

pub const DEFAULT_BASE_URL: &str = "https://openexchangerates.org";

// OpenExchangeRatesProvider implementation for RateProvider
pub struct OpenExchangeRatesProvider {
    base_url: String,
    app_id: Option<String>,
    client: reqwest::Client,
}

impl OpenExchangeRatesProvider {
    pub fn new(base_url: &str, app_id: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bankcsv/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(OpenExchangeRatesProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.map(str::to_string),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    base: String,
    rates: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
    description: Option<String>,
}

#[async_trait]
impl RateProvider for OpenExchangeRatesProvider {
    #[instrument(name = "OxrHistoricalFetch", skip(self), fields(date = %date))]
    async fn historical(&self, date: NaiveDate) -> Result<RateTable> {
        let app_id = self
            .app_id
            .as_deref()
            .ok_or_else(|| anyhow!("No Open Exchange Rates app id configured"))?;

        let endpoint = format!("/api/historical/{}.json", date.format("%Y-%m-%d"));
        debug!("Requesting historical rates from {}{}", self.base_url, endpoint);
        let url = format!("{}{}?app_id={}", self.base_url, endpoint, app_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for date: {}", e.without_url(), date))?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| match e.description {
                    Some(description) => format!(" ({}: {})", e.message, description),
                    None => format!(" ({})", e.message),
                })
                .unwrap_or_default();
            return Err(anyhow!("HTTP error: {} for date: {}{}", status, date, detail));
        }

        let data: HistoricalResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", date, e))?;

        if data.rates.is_empty() {
            return Err(anyhow!("No rate data found for date: {}", date));
        }

        Ok(RateTable::new(data.base, data.rates))
    }
}
