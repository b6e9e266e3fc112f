//! Test doubles shared by the integration tests.

pub mod mock_market_client;

#[allow(unused_imports)]
pub use mock_market_client::{coin_price, MockMarketClient};
