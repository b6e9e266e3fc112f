//! Market data service layer.
//!
//! Cached access to coin prices and price history. Every lookup goes through
//! a read-through cache keyed by request parameters, so repeated or
//! overlapping requests inside the TTL reuse one network call.

use crate::cache::ReadThroughCache;
use crate::client::AsyncMarketClient;
use crate::error::{CacheResult, FetchError};
use crate::models::{ChartPeriod, CoinPrice, MarketChart};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Cache key for the current price of a coin.
pub fn price_key(coin_id: &str) -> String {
    format!("price_{}", coin_id)
}

/// Cache key for a coin's history over `days` days.
pub fn history_key(coin_id: &str, days: u32) -> String {
    format!("history_{}_{}", coin_id, days)
}

/// Market data service trait for cached lookups.
#[async_trait]
pub trait MarketDataService: Send + Sync {
    /// Current price of one coin.
    async fn get_price(&self, coin_id: &str) -> CacheResult<CoinPrice>;

    /// Current prices of several coins, in the order given. Fails if any lookup fails.
    async fn get_prices(&self, coin_ids: &[String]) -> CacheResult<Vec<CoinPrice>>;

    /// Price history of one coin for the given period.
    async fn get_history(&self, coin_id: &str, period: ChartPeriod)
        -> CacheResult<Arc<MarketChart>>;

    /// Price histories of several coins, in the order given.
    async fn get_histories(
        &self,
        coin_ids: &[String],
        period: ChartPeriod,
    ) -> CacheResult<Vec<Arc<MarketChart>>>;

    /// Last price stored for a coin regardless of age.
    fn stale_price(&self, coin_id: &str) -> Option<CoinPrice>;
}

/// Default implementation of MarketDataService.
pub struct MarketDataServiceImpl {
    client: Arc<dyn AsyncMarketClient>,
    prices: ReadThroughCache<CoinPrice>,
    histories: ReadThroughCache<Arc<MarketChart>>,
}

impl MarketDataServiceImpl {
    /// Create a new market data service whose cached entries stay fresh for `ttl`.
    pub fn new(client: Arc<dyn AsyncMarketClient>, ttl: Duration) -> Self {
        Self {
            client,
            prices: ReadThroughCache::new(ttl),
            histories: ReadThroughCache::new(ttl),
        }
    }

    /// The price cache, for inspection.
    pub fn price_cache(&self) -> &ReadThroughCache<CoinPrice> {
        &self.prices
    }

    /// The history cache, for inspection.
    pub fn history_cache(&self) -> &ReadThroughCache<Arc<MarketChart>> {
        &self.histories
    }

    fn price_fetch(
        &self,
        coin_id: &str,
    ) -> impl Future<Output = Result<CoinPrice, FetchError>> + Send + 'static {
        let client = Arc::clone(&self.client);
        let coin_id = coin_id.to_string();

        async move {
            client.get_coin_price(&coin_id).await.map_err(|e| {
                tracing::error!("Error fetching price for {}: {}", coin_id, e);
                FetchError::from(e)
            })
        }
    }

    fn history_fetch(
        &self,
        coin_id: &str,
        days: u32,
    ) -> impl Future<Output = Result<Arc<MarketChart>, FetchError>> + Send + 'static {
        let client = Arc::clone(&self.client);
        let coin_id = coin_id.to_string();

        async move {
            client
                .get_market_chart(&coin_id, days)
                .await
                .map(Arc::new)
                .map_err(|e| {
                    tracing::error!("Error fetching {}-day history for {}: {}", days, coin_id, e);
                    FetchError::from(e)
                })
        }
    }
}

/// Pair each cache key with the coin id it was built from.
fn ids_by_key<'a>(keys: &'a [String], coin_ids: &'a [String]) -> HashMap<&'a str, &'a str> {
    keys.iter()
        .map(String::as_str)
        .zip(coin_ids.iter().map(String::as_str))
        .collect()
}

#[async_trait]
impl MarketDataService for MarketDataServiceImpl {
    async fn get_price(&self, coin_id: &str) -> CacheResult<CoinPrice> {
        self.prices
            .get(&price_key(coin_id), || self.price_fetch(coin_id))
            .await
    }

    async fn get_prices(&self, coin_ids: &[String]) -> CacheResult<Vec<CoinPrice>> {
        let keys: Vec<String> = coin_ids.iter().map(|id| price_key(id)).collect();
        let ids = ids_by_key(&keys, coin_ids);

        tracing::debug!("Loading prices for {} coins", coin_ids.len());

        self.prices
            .get_many(&keys, |key| {
                self.price_fetch(ids.get(key).copied().unwrap_or(key))
            })
            .await
    }

    async fn get_history(
        &self,
        coin_id: &str,
        period: ChartPeriod,
    ) -> CacheResult<Arc<MarketChart>> {
        let days = period.days();
        self.histories
            .get(&history_key(coin_id, days), || {
                self.history_fetch(coin_id, days)
            })
            .await
    }

    async fn get_histories(
        &self,
        coin_ids: &[String],
        period: ChartPeriod,
    ) -> CacheResult<Vec<Arc<MarketChart>>> {
        let days = period.days();
        let keys: Vec<String> = coin_ids.iter().map(|id| history_key(id, days)).collect();
        let ids = ids_by_key(&keys, coin_ids);

        self.histories
            .get_many(&keys, |key| {
                self.history_fetch(ids.get(key).copied().unwrap_or(key), days)
            })
            .await
    }

    fn stale_price(&self, coin_id: &str) -> Option<CoinPrice> {
        self.prices.get_stale(&price_key(coin_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct_per_parameter() {
        assert_eq!(price_key("bitcoin"), "price_bitcoin");
        assert_eq!(history_key("ethereum", 7), "history_ethereum_7");
        assert_ne!(history_key("ethereum", 7), history_key("ethereum", 30));
        assert_ne!(price_key("bitcoin"), history_key("bitcoin", 1));
    }

    #[test]
    fn test_ids_by_key() {
        let coin_ids = vec!["bitcoin".to_string(), "usd-coin".to_string()];
        let keys: Vec<String> = coin_ids.iter().map(|id| price_key(id)).collect();

        let ids = ids_by_key(&keys, &coin_ids);
        assert_eq!(ids.get("price_usd-coin"), Some(&"usd-coin"));
        assert_eq!(ids.len(), 2);
    }
}
