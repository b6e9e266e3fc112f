//! Historical market chart data from `/coins/{id}/market_chart`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time range selectable for price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChartPeriod {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "1y")]
    Year,
}

impl ChartPeriod {
    /// Value of the `days` query parameter for this period.
    pub fn days(self) -> u32 {
        match self {
            ChartPeriod::Day => 1,
            ChartPeriod::Week => 7,
            ChartPeriod::Month => 30,
            ChartPeriod::Year => 365,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartPeriod::Day => "24h",
            ChartPeriod::Week => "7d",
            ChartPeriod::Month => "30d",
            ChartPeriod::Year => "1y",
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "24h" => Ok(ChartPeriod::Day),
            "7d" => Ok(ChartPeriod::Week),
            "30d" => Ok(ChartPeriod::Month),
            "1y" => Ok(ChartPeriod::Year),
            other => Err(format!(
                "Unknown chart period '{}', expected one of 24h, 7d, 30d, 1y",
                other
            )),
        }
    }
}

/// One sample of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Price, market cap and volume history for a coin, in USD.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<PricePoint>,
    pub market_caps: Vec<PricePoint>,
    pub total_volumes: Vec<PricePoint>,
}

/// Raw body of the market chart endpoint: arrays of `[unix_millis, value]`.
#[derive(Debug, Deserialize)]
pub struct MarketChartResponse {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,

    #[serde(default)]
    pub market_caps: Vec<(f64, f64)>,

    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

fn to_points(raw: Vec<(f64, f64)>) -> Vec<PricePoint> {
    raw.into_iter()
        .filter_map(|(millis, value)| {
            let timestamp = DateTime::from_timestamp_millis(millis as i64);
            if timestamp.is_none() {
                tracing::debug!(millis, "Dropping chart point with invalid timestamp");
            }
            timestamp.map(|timestamp| PricePoint { timestamp, value })
        })
        .collect()
}

impl From<MarketChartResponse> for MarketChart {
    fn from(raw: MarketChartResponse) -> Self {
        MarketChart {
            prices: to_points(raw.prices),
            market_caps: to_points(raw.market_caps),
            total_volumes: to_points(raw.total_volumes),
        }
    }
}

impl MarketChart {
    /// Total number of points across all three series.
    pub fn point_count(&self) -> usize {
        self.prices.len() + self.market_caps.len() + self.total_volumes.len()
    }

    /// Most recent price sample.
    pub fn latest_price(&self) -> Option<&PricePoint> {
        self.prices.iter().max_by_key(|p| p.timestamp)
    }

    /// Percentage change between the first and last price sample.
    pub fn price_change_percentage(&self) -> Option<f64> {
        let first = self.prices.first()?;
        let last = self.prices.last()?;
        if first.value == 0.0 {
            return None;
        }
        Some((last.value - first.value) / first.value * 100.0)
    }
}
