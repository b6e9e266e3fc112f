//! Counters for traffic against the market API.
//!
//! One [`Metrics`] handle is created per client and cloned wherever requests
//! are timed; all clones update the same counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// HTTP status CoinGecko answers with once the per-minute quota is used up.
const RATE_LIMIT_STATUS: u16 = 429;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    failures: AtomicU64,
    rate_limited: AtomicU64,
    latency_total_ms: AtomicU64,
    slowest_ms: AtomicU64,
    prices: AtomicU64,
    chart_points: AtomicU64,
}

/// Shared request and payload counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_request(&self, latency: Duration) {
        let ms = latency.as_millis() as u64;
        let c = &self.counters;
        c.requests.fetch_add(1, Ordering::Relaxed);
        c.latency_total_ms.fetch_add(ms, Ordering::Relaxed);
        c.slowest_ms.fetch_max(ms, Ordering::Relaxed);
    }

    fn record_failure(&self, status: Option<u16>) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        if status == Some(RATE_LIMIT_STATUS) {
            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a price quote successfully extracted from a response.
    pub fn record_price_fetched(&self) {
        self.counters.prices.fetch_add(1, Ordering::Relaxed);
    }

    /// Count the points of a parsed market chart.
    pub fn record_chart_points(&self, count: usize) {
        self.counters
            .chart_points
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.counters.failures.load(Ordering::Relaxed)
    }

    /// Requests rejected because the API quota was exhausted.
    pub fn rate_limited_count(&self) -> u64 {
        self.counters.rate_limited.load(Ordering::Relaxed)
    }

    /// Mean request latency in milliseconds (0 before the first request).
    pub fn avg_latency_ms(&self) -> f64 {
        match self.request_count() {
            0 => 0.0,
            n => self.counters.latency_total_ms.load(Ordering::Relaxed) as f64 / n as f64,
        }
    }

    pub fn slowest_request_ms(&self) -> u64 {
        self.counters.slowest_ms.load(Ordering::Relaxed)
    }

    pub fn prices_fetched(&self) -> u64 {
        self.counters.prices.load(Ordering::Relaxed)
    }

    pub fn chart_points_fetched(&self) -> u64 {
        self.counters.chart_points.load(Ordering::Relaxed)
    }

    /// Snapshot of every counter, for the shutdown log.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            requests: self.request_count(),
            failures: self.failure_count(),
            rate_limited: self.rate_limited_count(),
            avg_latency_ms: self.avg_latency_ms(),
            slowest_request_ms: self.slowest_request_ms(),
            prices_fetched: self.prices_fetched(),
            chart_points_fetched: self.chart_points_fetched(),
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub requests: u64,
    pub failures: u64,
    pub rate_limited: u64,
    pub avg_latency_ms: f64,
    pub slowest_request_ms: u64,
    pub prices_fetched: u64,
    pub chart_points_fetched: u64,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API requests: {} ({} failed, {} rate limited), latency avg {:.1}ms / max {}ms, {} prices and {} chart points fetched",
            self.requests,
            self.failures,
            self.rate_limited,
            self.avg_latency_ms,
            self.slowest_request_ms,
            self.prices_fetched,
            self.chart_points_fetched,
        )
    }
}

/// Times one request and records it when finished.
pub struct HttpTimer {
    start: Instant,
    metrics: Metrics,
}

impl HttpTimer {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    /// Record a successful request.
    pub fn complete(self) -> Duration {
        let latency = self.start.elapsed();
        self.metrics.record_request(latency);
        latency
    }

    /// Record a failed request, with the HTTP status if the server answered.
    pub fn fail(self, status: Option<u16>) -> Duration {
        let latency = self.start.elapsed();
        self.metrics.record_request(latency);
        self.metrics.record_failure(status);
        latency
    }
}
