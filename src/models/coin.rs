//! Coin price data returned by the `/coins/{id}` endpoint.

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quote currency used for every value we extract.
pub const QUOTE_CURRENCY: &str = "usd";

/// Current market snapshot for a single coin, in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPrice {
    /// CoinGecko coin id (e.g. "bitcoin")
    pub id: String,

    /// Display name (e.g. "Bitcoin")
    pub name: String,

    /// Ticker symbol as returned by the API (lowercase, e.g. "btc")
    pub symbol: String,

    pub current_price: f64,

    /// Percentage change over the last 24 hours (null for some thin markets)
    pub price_change_percentage_24h: Option<f64>,

    pub market_cap: Option<f64>,

    pub total_volume: Option<f64>,
}

/// Raw body of `GET /coins/{id}` with only the fields we read.
#[derive(Debug, Deserialize)]
pub struct CoinDetailsResponse {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_data: MarketData,
}

/// The `market_data` object; currency maps are keyed by lowercase currency code.
#[derive(Debug, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub current_price: HashMap<String, f64>,

    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,

    #[serde(default)]
    pub market_cap: HashMap<String, f64>,

    #[serde(default)]
    pub total_volume: HashMap<String, f64>,
}

impl TryFrom<CoinDetailsResponse> for CoinPrice {
    type Error = ApiError;

    fn try_from(raw: CoinDetailsResponse) -> ApiResult<Self> {
        let current_price = raw
            .market_data
            .current_price
            .get(QUOTE_CURRENCY)
            .copied()
            .ok_or_else(|| {
                ApiError::MissingField(format!("market_data.current_price.{}", QUOTE_CURRENCY))
            })?;

        Ok(CoinPrice {
            id: raw.id,
            name: raw.name,
            symbol: raw.symbol,
            current_price,
            price_change_percentage_24h: raw.market_data.price_change_percentage_24h,
            market_cap: raw.market_data.market_cap.get(QUOTE_CURRENCY).copied(),
            total_volume: raw.market_data.total_volume.get(QUOTE_CURRENCY).copied(),
        })
    }
}

impl CoinPrice {
    /// Ticker symbol in upper case, as shown in reports.
    pub fn display_symbol(&self) -> String {
        self.symbol.to_uppercase()
    }
}
