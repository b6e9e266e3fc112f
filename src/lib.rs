//! Coin Portfolio - a cryptocurrency portfolio tracker backed by the CoinGecko API.
//!
//! Market data is read through a TTL cache that coalesces concurrent requests
//! for the same key into a single upstream call, and is refreshed on a fixed
//! interval in the background.
//!
//! # Architecture
//!
//! - **cache**: Coalescing read-through TTL cache
//! - **client**: HTTP client for the CoinGecko API
//! - **config**: Configuration management from environment variables
//! - **error**: Custom error types for precise error handling
//! - **matching**: Fuzzy asset search
//! - **metrics**: HTTP and fetch counters
//! - **models**: Prices, charts, positions and portfolio aggregation
//! - **scheduler**: Periodic refresh task
//! - **services**: Cached market data and portfolio loading

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod services;

// Re-export commonly used types
pub use cache::{CacheStats, ReadThroughCache};
pub use client::CoinGeckoClient;
pub use config::Config;
pub use error::{ApiError, CacheError, ComputationError, ConfigError, FetchError};
pub use matching::{AssetMatch, AssetMatcher};
pub use metrics::{HttpTimer, Metrics, MetricsSummary};
pub use models::{AssetPosition, ChartPeriod, CoinPrice, Holding, MarketChart, PortfolioSummary};
pub use scheduler::{RefreshHandle, RefreshScheduler};
pub use services::{
    DataSource, MarketDataService, MarketDataServiceImpl, PortfolioService, PortfolioServiceImpl,
    PortfolioSnapshot,
};
