//! Configuration management for the portfolio tracker.
//!
//! This module handles loading and validating configuration from environment variables.
//! A `.env` file in the working directory is loaded first if present.

use crate::error::{ConfigError, ConfigResult};
use crate::models::{ChartPeriod, Holding};
use std::env;
use std::time::Duration;

/// Public CoinGecko v3 endpoint.
pub const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Holdings used when `PORTFOLIO_HOLDINGS` is not set.
pub const DEFAULT_HOLDINGS: &str = "bitcoin=0.5,ethereum=2.0,cardano=1000";

/// Configuration for the portfolio tracker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Market API base URL
    pub api_url: String,

    /// Optional CoinGecko demo API key
    pub api_key: Option<String>,

    /// How long fetched prices and charts stay fresh, in seconds (default: 300)
    pub cache_ttl_seconds: u64,

    /// Interval between background refreshes, in seconds (default: 30)
    pub refresh_interval_seconds: u64,

    /// HTTP request timeout in seconds (default: 10)
    pub request_timeout: u64,

    /// Coins held and their amounts
    pub holdings: Vec<Holding>,

    /// History range loaded for charts (default: 7d)
    pub chart_period: ChartPeriod,

    /// Log level used when RUST_LOG is unset (default: "info")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `COINGECKO_API_URL`: Base URL for the market API (default: public CoinGecko v3)
    /// - `COINGECKO_API_KEY`: Demo API key, sent as `x-cg-demo-api-key`
    /// - `CACHE_TTL_SECONDS`: Cache TTL in seconds (default: 300)
    /// - `REFRESH_INTERVAL_SECONDS`: Refresh interval in seconds (default: 30)
    /// - `REQUEST_TIMEOUT`: HTTP timeout in seconds (default: 10)
    /// - `PORTFOLIO_HOLDINGS`: Comma separated `coin_id=amount` pairs
    /// - `CHART_PERIOD`: One of 24h, 7d, 30d, 1y (default: 7d)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    pub fn from_env() -> ConfigResult<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();
        Self::from_process_env()
    }

    /// Read the process environment without consulting `.env`.
    fn from_process_env() -> ConfigResult<Self> {
        let api_url = env::var("COINGECKO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "COINGECKO_API_URL".to_string(),
                reason: "Must start with http:// or https://".to_string(),
            });
        }

        let api_key = env::var("COINGECKO_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let cache_ttl_seconds = Self::parse_env_u64("CACHE_TTL_SECONDS", 300)?;
        let refresh_interval_seconds = Self::parse_env_u64("REFRESH_INTERVAL_SECONDS", 30)?;
        let request_timeout = Self::parse_env_u64("REQUEST_TIMEOUT", 10)?;

        if refresh_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                var: "REFRESH_INTERVAL_SECONDS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        let holdings_raw =
            env::var("PORTFOLIO_HOLDINGS").unwrap_or_else(|_| DEFAULT_HOLDINGS.to_string());
        let holdings = Self::parse_holdings("PORTFOLIO_HOLDINGS", &holdings_raw)?;

        let chart_period = match env::var("CHART_PERIOD") {
            Ok(val) => val
                .parse::<ChartPeriod>()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: "CHART_PERIOD".to_string(),
                    reason,
                })?,
            Err(_) => ChartPeriod::default(),
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            api_url,
            api_key,
            cache_ttl_seconds,
            refresh_interval_seconds,
            request_timeout,
            holdings,
            chart_period,
            log_level,
        })
    }

    /// Cache TTL as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Refresh interval as a `Duration`.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    /// Coin ids of all configured holdings, in configuration order.
    pub fn coin_ids(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.coin_id.clone()).collect()
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse `coin_id=amount` pairs separated by commas.
    fn parse_holdings(var_name: &str, raw: &str) -> ConfigResult<Vec<Holding>> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            var: var_name.to_string(),
            reason,
        };

        let mut holdings: Vec<Holding> = Vec::new();

        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (coin_id, amount) = pair
                .split_once('=')
                .ok_or_else(|| invalid(format!("Expected coin_id=amount, got: {}", pair)))?;

            let coin_id = coin_id.trim().to_lowercase();
            if coin_id.is_empty() {
                return Err(invalid(format!("Missing coin id in: {}", pair)));
            }

            let amount = amount
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|a| a.is_finite() && *a >= 0.0)
                .ok_or_else(|| {
                    invalid(format!("Amount must be a non-negative number, got: {}", pair))
                })?;

            if holdings.iter().any(|h| h.coin_id == coin_id) {
                return Err(invalid(format!("Duplicate coin id: {}", coin_id)));
            }

            holdings.push(Holding::new(coin_id, amount));
        }

        if holdings.is_empty() {
            return Err(ConfigError::Other(format!(
                "{} must list at least one holding",
                var_name
            )));
        }

        Ok(holdings)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            cache_ttl_seconds: 300,
            refresh_interval_seconds: 30,
            request_timeout: 10,
            holdings: vec![
                Holding::new("bitcoin", 0.5),
                Holding::new("ethereum", 2.0),
                Holding::new("cardano", 1000.0),
            ],
            chart_period: ChartPeriod::Week,
            log_level: "info".to_string(),
        }
    }
}
