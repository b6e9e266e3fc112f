//! Coin Portfolio - Main entry point
//!
//! Loads the configured portfolio, prints a report to stdout and keeps the
//! market data cache warm until interrupted with Ctrl-C.

use anyhow::Result;
use coin_portfolio::client::{AsyncMarketClient, AsyncMarketClientImpl};
use coin_portfolio::models::format_percent;
use coin_portfolio::{
    CoinGeckoClient, Config, MarketDataService, MarketDataServiceImpl, PortfolioService,
    PortfolioServiceImpl, RefreshScheduler,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging (stderr only, stdout carries the report)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Coin Portfolio with API URL: {}", config.api_url);
    info!(
        "Cache TTL: {}s, refresh interval: {}s, {} holdings",
        config.cache_ttl_seconds,
        config.refresh_interval_seconds,
        config.holdings.len()
    );

    // Initialize CoinGecko client
    let sync_client = CoinGeckoClient::new(&config);
    let metrics = sync_client.metrics().clone();
    let client = Arc::new(AsyncMarketClientImpl::new(sync_client)) as Arc<dyn AsyncMarketClient>;

    // Initialize services
    let market = Arc::new(MarketDataServiceImpl::new(client, config.cache_ttl()));
    let portfolio = Arc::new(PortfolioServiceImpl::new(
        Arc::clone(&market) as Arc<dyn MarketDataService>,
        config.holdings.clone(),
    ));

    let snapshot = portfolio.load().await?;
    println!("{}", snapshot);

    let coin_ids = config.coin_ids();
    let period = config.chart_period;
    match market.get_histories(&coin_ids, period).await {
        Ok(charts) => {
            for (coin_id, chart) in coin_ids.iter().zip(&charts) {
                info!(
                    "{} history ({}): {} points, change {}",
                    coin_id,
                    period,
                    chart.point_count(),
                    format_percent(chart.price_change_percentage())
                );
            }
        }
        Err(e) => warn!("Price history unavailable: {}", e),
    }

    // Keep prices and history fresh in the background
    let scheduler = {
        let market = Arc::clone(&market);
        let portfolio = Arc::clone(&portfolio);
        let coin_ids = coin_ids.clone();

        RefreshScheduler::spawn(config.refresh_interval(), move || {
            let market = Arc::clone(&market);
            let portfolio = Arc::clone(&portfolio);
            let coin_ids = coin_ids.clone();

            async move {
                match portfolio.load().await {
                    Ok(snapshot) => println!("{}", snapshot),
                    Err(e) => error!("Portfolio refresh failed: {}", e),
                }

                if let Err(e) = market.get_histories(&coin_ids, period).await {
                    warn!("History refresh failed: {}", e);
                }
            }
        })
    };

    info!("Press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }

    scheduler.shutdown().await;

    let stats = market.price_cache().stats();
    info!(
        "Price cache: {} hits, {} misses, {} coalesced, {} failed ({:.1}% served from cache)",
        stats.hits(),
        stats.misses(),
        stats.coalesced(),
        stats.failed_fetches(),
        stats.hit_rate() * 100.0
    );
    info!("{}", metrics.summary());
    info!("Coin Portfolio shutdown complete");

    Ok(())
}
