use async_trait::async_trait;
use coin_portfolio::client::AsyncMarketClient;
use coin_portfolio::error::{ApiError, ApiResult};
use coin_portfolio::models::{CoinPrice, MarketChart, PricePoint};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a price record the way the API would return it.
#[allow(dead_code)]
pub fn coin_price(id: &str, symbol: &str, price: f64, change_24h: f64) -> CoinPrice {
    let mut name = id.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    CoinPrice {
        id: id.to_string(),
        name,
        symbol: symbol.to_string(),
        current_price: price,
        price_change_percentage_24h: Some(change_24h),
        market_cap: None,
        total_volume: None,
    }
}

/// In-memory market client with call counting, failure injection and latency.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct MockMarketClient {
    prices: Arc<Mutex<HashMap<String, CoinPrice>>>,
    charts: Arc<Mutex<HashMap<(String, u32), MarketChart>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    call_counts: Arc<Mutex<HashMap<String, usize>>>,
}

#[allow(dead_code)]
impl MockMarketClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, price: CoinPrice) {
        self.prices.lock().unwrap().insert(price.id.clone(), price);
    }

    pub fn set_chart(&self, coin_id: &str, days: u32, values: &[f64]) {
        let prices = values
            .iter()
            .enumerate()
            .map(|(i, value)| PricePoint {
                timestamp: chrono::DateTime::from_timestamp(1_700_000_000 + i as i64 * 3600, 0)
                    .unwrap(),
                value: *value,
            })
            .collect();

        self.charts.lock().unwrap().insert(
            (coin_id.to_string(), days),
            MarketChart {
                prices,
                ..MarketChart::default()
            },
        );
    }

    /// Make every request for `coin_id` fail with a 503.
    pub fn fail(&self, coin_id: &str) {
        self.failing.lock().unwrap().insert(coin_id.to_string());
    }

    pub fn recover(&self, coin_id: &str) {
        self.failing.lock().unwrap().remove(coin_id);
    }

    /// Delay every response by `delay` (measured on the tokio clock).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of calls for `method` ("get_coin_price" or "get_market_chart") and coin.
    pub fn get_call_count(&self, method: &str, coin_id: &str) -> usize {
        let counts = self.call_counts.lock().unwrap();
        *counts.get(&format!("{}:{}", method, coin_id)).unwrap_or(&0)
    }

    /// Number of calls for `method` across all coins.
    pub fn total_calls(&self, method: &str) -> usize {
        let prefix = format!("{}:", method);
        self.call_counts
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn reset_call_counts(&self) {
        self.call_counts.lock().unwrap().clear();
    }

    fn track_call(&self, method: &str, coin_id: &str) {
        let mut counts = self.call_counts.lock().unwrap();
        *counts.entry(format!("{}:{}", method, coin_id)).or_insert(0) += 1;
    }

    async fn respond(&self, coin_id: &str) -> ApiResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(coin_id) {
            return Err(ApiError::ApiError {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncMarketClient for MockMarketClient {
    async fn get_coin_price(&self, coin_id: &str) -> ApiResult<CoinPrice> {
        self.track_call("get_coin_price", coin_id);
        self.respond(coin_id).await?;

        self.prices
            .lock()
            .unwrap()
            .get(coin_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("coin {}", coin_id)))
    }

    async fn get_market_chart(&self, coin_id: &str, days: u32) -> ApiResult<MarketChart> {
        self.track_call("get_market_chart", coin_id);
        self.respond(coin_id).await?;

        self.charts
            .lock()
            .unwrap()
            .get(&(coin_id.to_string(), days))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("chart {} {}d", coin_id, days)))
    }
}
