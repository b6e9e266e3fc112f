//! Data models for market data and portfolio positions.
//!
//! This module contains the coin quotes and price history returned by the
//! market API, and the portfolio types computed from them.

pub mod chart;
pub mod coin;
pub mod portfolio;

pub use chart::{ChartPeriod, MarketChart, MarketChartResponse, PricePoint};
pub use coin::{CoinDetailsResponse, CoinPrice};
pub use portfolio::{
    format_percent, format_usd, summarize, AssetPosition, BestPerformer, Holding,
    PortfolioSummary,
};
