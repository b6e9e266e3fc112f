//! HTTP client for the CoinGecko market data API.
//!
//! This module provides a synchronous HTTP client that can be used from async contexts
//! via `tokio::task::spawn_blocking`. The client handles the optional API key header,
//! error mapping, and extraction of the USD figures we need.

mod async_wrapper;
pub use async_wrapper::{AsyncMarketClient, AsyncMarketClientImpl};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{HttpTimer, Metrics};
use crate::models::{CoinDetailsResponse, CoinPrice, MarketChart, MarketChartResponse};
use std::sync::Arc;
use std::time::Duration;

/// Header carrying a CoinGecko demo API key.
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// HTTP client for the CoinGecko API.
///
/// This client uses `ureq` for synchronous HTTP requests and can be called
/// from async contexts using `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct CoinGeckoClient {
    /// Base URL for the API
    base_url: String,

    /// Optional demo API key
    api_key: Option<String>,

    /// HTTP client agent
    agent: Arc<ureq::Agent>,

    /// Metrics collector
    metrics: Metrics,
}

impl CoinGeckoClient {
    /// Create a new client from configuration.
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout))
            .build();

        Self {
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            agent: Arc::new(agent),
            metrics: Metrics::new(),
        }
    }

    /// Create a client with a custom base URL (useful for testing).
    #[doc(hidden)]
    pub fn with_base_url(base_url: String, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();

        Self {
            base_url,
            api_key,
            agent: Arc::new(agent),
            metrics: Metrics::new(),
        }
    }

    /// Get a reference to the metrics collector.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Build a full URL from a path.
    fn build_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Execute a GET request and return the response body.
    fn get(&self, path: &str) -> ApiResult<String> {
        let timer = HttpTimer::new(self.metrics.clone());
        let url = self.build_url(path);

        let mut request = self.agent.get(&url).set("accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set(API_KEY_HEADER, key);
        }

        let result = request
            .call()
            .map_err(|e| self.map_error(e))
            .and_then(|response| {
                response
                    .into_string()
                    .map_err(|e| ApiError::HttpError(e.to_string()))
            });

        match &result {
            Ok(_) => {
                let duration = timer.complete();
                tracing::debug!("GET {} - Success ({}ms)", url, duration.as_millis());
            }
            Err(e) => {
                timer.fail(e.status());
                tracing::error!("GET {} - Error: {}", url, e);
            }
        }

        result
    }

    /// Map a ureq error to an ApiError.
    fn map_error(&self, error: ureq::Error) -> ApiError {
        match error {
            ureq::Error::Status(code, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "Unknown error".to_string());

                match code {
                    401 => ApiError::Unauthorized,
                    404 => ApiError::NotFound(message),
                    429 => ApiError::RateLimitExceeded,
                    _ => ApiError::ApiError {
                        status: code,
                        message,
                    },
                }
            }
            ureq::Error::Transport(transport) => {
                if transport.kind() == ureq::ErrorKind::ConnectionFailed {
                    ApiError::HttpError("Connection failed".to_string())
                } else if transport.kind() == ureq::ErrorKind::Io {
                    ApiError::Timeout
                } else {
                    ApiError::HttpError(transport.to_string())
                }
            }
        }
    }

    /// Get the current USD price and 24h change for a coin.
    pub fn get_coin_price(&self, coin_id: &str) -> ApiResult<CoinPrice> {
        let path = format!(
            "/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
            urlencoding::encode(coin_id)
        );
        let body = self.get(&path)?;

        let raw: CoinDetailsResponse = serde_json::from_str(&body).map_err(ApiError::JsonError)?;
        let price = CoinPrice::try_from(raw)?;

        self.metrics.record_price_fetched();
        Ok(price)
    }

    /// Get USD price, market cap and volume history for the last `days` days.
    pub fn get_market_chart(&self, coin_id: &str, days: u32) -> ApiResult<MarketChart> {
        let path = format!(
            "/coins/{}/market_chart?vs_currency=usd&days={}",
            urlencoding::encode(coin_id),
            days
        );
        let body = self.get(&path)?;

        let raw: MarketChartResponse = serde_json::from_str(&body).map_err(ApiError::JsonError)?;
        let chart = MarketChart::from(raw);

        self.metrics.record_chart_points(chart.point_count());
        Ok(chart)
    }
}
