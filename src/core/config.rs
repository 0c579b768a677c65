use super::calendar::DayZone;
use super::currency::canonical_currency;
use super::fetcher::FetchOptions;
use crate::providers::open_exchange_rates::DEFAULT_BASE_URL;
use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Environment variable that overrides the configured app id.
pub const APP_ID_ENV: &str = "OPENEXCHANGERATES_APP_ID";

const RATES_FILE: &str = "rates.json";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenExchangeRatesConfig {
    pub base_url: String,
    pub app_id: Option<String>,
}

impl Default for OpenExchangeRatesConfig {
    fn default() -> Self {
        OpenExchangeRatesConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub open_exchange_rates: OpenExchangeRatesConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub local_currency: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
    pub download_path: Option<String>,
    #[serde(default = "default_combine_installments")]
    pub combine_installments: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// IANA zone whose midnight starts a transaction day; the machine's zone
    /// when unset.
    pub timezone: Option<String>,
}

fn default_combine_installments() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_save_debounce_ms() -> u64 {
    500
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("io", "bankcsv", "bankcsv")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Location of the persisted rate cache.
    pub fn rates_cache_path(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join(RATES_FILE))
    }

    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(self.download_path.as_deref().unwrap_or("downloads"))
    }

    /// App id from the environment, falling back to the config file.
    pub fn app_id(&self) -> Option<String> {
        self.resolve_app_id(std::env::var(APP_ID_ENV).ok())
    }

    fn resolve_app_id(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.providers.open_exchange_rates.app_id.clone())
    }

    pub fn day_zone(&self) -> Result<DayZone> {
        match self.timezone.as_deref() {
            Some(zone) => zone.parse(),
            None => Ok(DayZone::Local),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            save_debounce: Duration::from_millis(self.save_debounce_ms),
        }
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.local_currency = canonical_currency(&config.local_currency);
        ensure!(
            config.local_currency.len() == 3,
            "Invalid local currency in {}: {}",
            path.as_ref().display(),
            config.local_currency
        );
        let zone = config
            .day_zone()
            .with_context(|| format!("Invalid timezone in {}", path.as_ref().display()))?;
        debug!(%zone, "Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(yaml: &str) -> Result<AppConfig> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(yaml.as_bytes())?;
        AppConfig::load_from_path(file.path())
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
local_currency: "ILS"
providers:
  open_exchange_rates:
    base_url: "http://example.com/oxr"
    app_id: "abc123"
data_path: "/tmp/bankcsv"
download_path: "/tmp/bankcsv/out"
combine_installments: false
request_timeout_secs: 5
save_debounce_ms: 100
"#;

        let config = load_str(yaml_str).expect("Failed to load config");
        assert_eq!(config.local_currency, "ILS");
        assert_eq!(
            config.providers.open_exchange_rates.base_url,
            "http://example.com/oxr"
        );
        assert_eq!(
            config.providers.open_exchange_rates.app_id.as_deref(),
            Some("abc123")
        );
        assert!(!config.combine_installments);
        assert_eq!(
            config.rates_cache_path().unwrap(),
            PathBuf::from("/tmp/bankcsv/rates.json")
        );
        assert_eq!(config.download_dir(), PathBuf::from("/tmp/bankcsv/out"));

        let options = config.fetch_options();
        assert_eq!(options.request_timeout, Duration::from_secs(5));
        assert_eq!(options.save_debounce, Duration::from_millis(100));
    }

    #[test]
    fn test_config_defaults() {
        let config = load_str("local_currency: nis\n").unwrap();

        assert_eq!(config.local_currency, "ILS");
        assert_eq!(config.providers.open_exchange_rates.base_url, DEFAULT_BASE_URL);
        assert!(config.providers.open_exchange_rates.app_id.is_none());
        assert!(config.combine_installments);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.save_debounce_ms, 500);
        assert_eq!(config.download_dir(), PathBuf::from("downloads"));
        assert_eq!(config.day_zone().unwrap(), DayZone::Local);
    }

    #[test]
    fn test_config_timezone() {
        let config = load_str("local_currency: ILS\ntimezone: Asia/Jerusalem\n").unwrap();
        assert_eq!(config.day_zone().unwrap().to_string(), "Asia/Jerusalem");

        let err = load_str("local_currency: ILS\ntimezone: Jerusalem\n").unwrap_err();
        assert!(err.to_string().contains("Invalid timezone"));
    }

    #[test]
    fn test_app_id_from_environment_wins() {
        let config = load_str(
            "local_currency: ILS\nproviders:\n  open_exchange_rates:\n    base_url: http://localhost\n    app_id: from-file\n",
        )
        .unwrap();

        assert_eq!(
            config.resolve_app_id(Some("from-env".to_string())).as_deref(),
            Some("from-env")
        );
        // Blank variables are ignored
        assert_eq!(
            config.resolve_app_id(Some("  ".to_string())).as_deref(),
            Some("from-file")
        );
        assert_eq!(config.resolve_app_id(None).as_deref(), Some("from-file"));
    }

    #[test]
    fn test_config_rejects_bad_currency() {
        let err = load_str("local_currency: shekel\n").unwrap_err();
        assert!(err.to_string().contains("Invalid local currency"));
    }

    #[test]
    fn test_config_requires_local_currency() {
        let err = load_str("download_path: out\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
