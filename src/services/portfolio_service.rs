//! Portfolio service layer.
//!
//! Loads current prices for the configured holdings and turns them into
//! positions and a summary. When live prices cannot be loaded it falls back
//! to the last cached prices, then to a static placeholder portfolio.

use crate::error::ComputationResult;
use crate::matching::AssetMatcher;
use crate::models::{
    format_percent, format_usd, summarize, AssetPosition, CoinPrice, Holding, PortfolioSummary,
};
use crate::services::MarketDataService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Where the prices behind a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fresh from the cache or the API
    Live,
    /// Older than the cache TTL, served because the API failed
    Stale,
    /// Static placeholder data
    Placeholder,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSource::Live => "live",
            DataSource::Stale => "stale cache",
            DataSource::Placeholder => "placeholder",
        })
    }
}

/// Positions and totals at one point in time.
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub positions: Vec<AssetPosition>,
    pub summary: PortfolioSummary,
    pub source: DataSource,
    pub loaded_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    /// Positions matching a search query, in portfolio order.
    pub fn search(&self, query: &str) -> Vec<&AssetPosition> {
        AssetMatcher::default().filter(&self.positions, query)
    }
}

impl fmt::Display for PortfolioSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Portfolio at {} ({})",
            self.loaded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.source
        )?;
        writeln!(f, "{}", self.summary)?;
        writeln!(
            f,
            "{:<8} {:>14} {:>9} {:>16} {:>16}",
            "ASSET", "PRICE", "24H", "HOLDINGS", "VALUE"
        )?;
        for position in &self.positions {
            writeln!(
                f,
                "{:<8} {:>14} {:>9} {:>16.4} {:>16}",
                position.symbol,
                format_usd(position.price),
                format_percent(Some(position.change_24h)),
                position.holdings,
                format_usd(position.value())
            )?;
        }
        Ok(())
    }
}

/// Portfolio service trait for business operations.
#[async_trait]
pub trait PortfolioService: Send + Sync {
    /// Price every holding and summarize the result.
    ///
    /// Only fails when the summary cannot be computed; price failures are
    /// handled by falling back to older or placeholder data.
    async fn load(&self) -> ComputationResult<PortfolioSnapshot>;

    /// Configured holdings.
    fn holdings(&self) -> &[Holding];
}

/// Default implementation of PortfolioService.
pub struct PortfolioServiceImpl {
    market: Arc<dyn MarketDataService>,
    holdings: Vec<Holding>,
}

impl PortfolioServiceImpl {
    /// Create a new portfolio service.
    pub fn new(market: Arc<dyn MarketDataService>, holdings: Vec<Holding>) -> Self {
        Self { market, holdings }
    }

    fn coin_ids(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.coin_id.clone()).collect()
    }

    /// Pair holdings with prices returned in holding order.
    fn positions_from(&self, prices: &[CoinPrice]) -> Vec<AssetPosition> {
        self.holdings
            .iter()
            .zip(prices)
            .map(|(holding, price)| AssetPosition::from_price(price, holding.amount))
            .collect()
    }

    /// Positions from cached prices of any age, if every holding has one.
    fn stale_positions(&self) -> Option<Vec<AssetPosition>> {
        self.holdings
            .iter()
            .map(|holding| {
                self.market
                    .stale_price(&holding.coin_id)
                    .map(|price| AssetPosition::from_price(&price, holding.amount))
            })
            .collect()
    }
}

#[async_trait]
impl PortfolioService for PortfolioServiceImpl {
    async fn load(&self) -> ComputationResult<PortfolioSnapshot> {
        let coin_ids = self.coin_ids();

        let (positions, source) = match self.market.get_prices(&coin_ids).await {
            Ok(prices) => (self.positions_from(&prices), DataSource::Live),
            Err(e) => {
                tracing::warn!("Error loading portfolio prices: {}", e);
                match self.stale_positions() {
                    Some(positions) => {
                        tracing::warn!("Using stale cached prices");
                        (positions, DataSource::Stale)
                    }
                    None => {
                        tracing::warn!("No cached prices, falling back to placeholder portfolio");
                        (AssetPosition::placeholder_portfolio(), DataSource::Placeholder)
                    }
                }
            }
        };

        let summary = summarize(&positions)?;

        tracing::info!(
            total_value = summary.total_value,
            daily_change = summary.daily_change,
            assets = summary.asset_count,
            source = %source,
            "Portfolio loaded"
        );

        Ok(PortfolioSnapshot {
            positions,
            summary,
            source,
            loaded_at: Utc::now(),
        })
    }

    fn holdings(&self) -> &[Holding] {
        &self.holdings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, CacheResult, FetchError};
    use crate::models::{ChartPeriod, MarketChart};
    use tokio_test::{assert_err, assert_ok, block_on};

    /// Market data that is never available, with an optional stale fallback.
    struct Unavailable {
        stale: Option<CoinPrice>,
    }

    #[async_trait]
    impl MarketDataService for Unavailable {
        async fn get_price(&self, _coin_id: &str) -> CacheResult<CoinPrice> {
            Err(CacheError::Fetch(FetchError::with_status(503, "down")))
        }

        async fn get_prices(&self, _coin_ids: &[String]) -> CacheResult<Vec<CoinPrice>> {
            Err(CacheError::Fetch(FetchError::with_status(503, "down")))
        }

        async fn get_history(
            &self,
            _coin_id: &str,
            _period: ChartPeriod,
        ) -> CacheResult<Arc<MarketChart>> {
            Err(CacheError::Fetch(FetchError::new("down")))
        }

        async fn get_histories(
            &self,
            _coin_ids: &[String],
            _period: ChartPeriod,
        ) -> CacheResult<Vec<Arc<MarketChart>>> {
            Err(CacheError::Fetch(FetchError::new("down")))
        }

        fn stale_price(&self, _coin_id: &str) -> Option<CoinPrice> {
            self.stale.clone()
        }
    }

    fn bitcoin() -> CoinPrice {
        CoinPrice {
            id: "bitcoin".to_string(),
            name: "Bitcoin".to_string(),
            symbol: "btc".to_string(),
            current_price: 40000.0,
            price_change_percentage_24h: None,
            market_cap: None,
            total_volume: None,
        }
    }

    #[test]
    fn test_placeholder_when_nothing_cached() {
        let service = PortfolioServiceImpl::new(
            Arc::new(Unavailable { stale: None }),
            vec![Holding::new("bitcoin", 1.0)],
        );

        let snapshot = assert_ok!(block_on(service.load()));
        assert_eq!(snapshot.source, DataSource::Placeholder);
        assert_eq!(snapshot.positions.len(), 3);
        assert_eq!(service.holdings().len(), 1);
    }

    #[test]
    fn test_stale_when_every_holding_cached() {
        let service = PortfolioServiceImpl::new(
            Arc::new(Unavailable {
                stale: Some(bitcoin()),
            }),
            vec![Holding::new("bitcoin", 0.25)],
        );

        let snapshot = assert_ok!(block_on(service.load()));
        assert_eq!(snapshot.source, DataSource::Stale);
        assert_eq!(snapshot.summary.total_value, 10000.0);
        // Missing 24h change counts as flat
        assert_eq!(snapshot.summary.daily_change, 0.0);
    }

    #[test]
    fn test_invalid_stale_data_is_an_error() {
        let mut broken = bitcoin();
        broken.current_price = f64::NAN;

        let service = PortfolioServiceImpl::new(
            Arc::new(Unavailable { stale: Some(broken) }),
            vec![Holding::new("bitcoin", 1.0)],
        );

        assert_err!(block_on(service.load()));
    }

    #[test]
    fn test_snapshot_display() {
        let positions = AssetPosition::placeholder_portfolio();
        let snapshot = PortfolioSnapshot {
            summary: assert_ok!(summarize(&positions)),
            positions,
            source: DataSource::Placeholder,
            loaded_at: Utc::now(),
        };

        let report = snapshot.to_string();
        assert!(report.contains("(placeholder)"));
        assert!(report.contains("Total value:    $30,150.00"));
        assert!(report.contains("ASSET"));
        assert_eq!(report.lines().filter(|l| l.starts_with("ADA")).count(), 1);
        assert_eq!(DataSource::Stale.to_string(), "stale cache");
    }
}
