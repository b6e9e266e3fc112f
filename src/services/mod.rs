//! Application service layer.
//!
//! Services contain business logic and orchestrate interactions between the
//! market API client, the caches and the portfolio computations.

mod market_data_service;
mod portfolio_service;

pub use market_data_service::{history_key, price_key, MarketDataService, MarketDataServiceImpl};
pub use portfolio_service::{
    DataSource, PortfolioService, PortfolioServiceImpl, PortfolioSnapshot,
};
