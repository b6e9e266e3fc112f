//! Async wrapper around the synchronous CoinGeckoClient.
//!
//! This module provides an async interface to the synchronous client by using
//! `tokio::task::spawn_blocking` to run HTTP operations on a dedicated thread pool,
//! preventing blocking of the async runtime.

use crate::client::CoinGeckoClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{CoinPrice, MarketChart};
use async_trait::async_trait;
use std::sync::Arc;

/// Async market data operations.
///
/// Services depend on this trait rather than the concrete client so tests
/// can substitute an in-memory implementation.
#[async_trait]
pub trait AsyncMarketClient: Send + Sync {
    async fn get_coin_price(&self, coin_id: &str) -> ApiResult<CoinPrice>;
    async fn get_market_chart(&self, coin_id: &str, days: u32) -> ApiResult<MarketChart>;
}

/// Async wrapper around synchronous CoinGeckoClient.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous HTTP
/// operations on a dedicated thread pool, preventing blocking
/// the async runtime.
#[derive(Clone)]
pub struct AsyncMarketClientImpl {
    client: Arc<CoinGeckoClient>,
}

impl AsyncMarketClientImpl {
    pub fn new(client: CoinGeckoClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// The wrapped blocking client.
    pub fn inner(&self) -> &CoinGeckoClient {
        &self.client
    }
}

#[async_trait]
impl AsyncMarketClient for AsyncMarketClientImpl {
    async fn get_coin_price(&self, coin_id: &str) -> ApiResult<CoinPrice> {
        let client = self.client.clone();
        let coin_id = coin_id.to_string();

        tokio::task::spawn_blocking(move || client.get_coin_price(&coin_id))
            .await
            .map_err(|e| ApiError::HttpError(format!("Task join error: {}", e)))?
    }

    async fn get_market_chart(&self, coin_id: &str, days: u32) -> ApiResult<MarketChart> {
        let client = self.client.clone();
        let coin_id = coin_id.to_string();

        tokio::task::spawn_blocking(move || client.get_market_chart(&coin_id, days))
            .await
            .map_err(|e| ApiError::HttpError(format!("Task join error: {}", e)))?
    }
}
