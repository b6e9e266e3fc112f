//! Read-through cache with TTL (Time To Live) and request coalescing.
//!
//! A lookup serves the stored payload while it is younger than the TTL.
//! Otherwise it runs the caller's fetch operation, stores the result and
//! returns it. Concurrent lookups of the same missing or stale key share a
//! single in-flight fetch.

use crate::error::{CacheError, CacheResult, FetchError};
use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::time::Instant;

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$").expect("Failed to compile cache key regex")
});

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, FetchError>>>;

/// A stored payload with the time it was obtained.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    fetched_at: Instant,
}

/// A fetch that is still running for some key.
struct PendingFetch<V> {
    id: u64,
    future: SharedFetch<V>,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    in_flight: HashMap<String, PendingFetch<V>>,
    next_fetch_id: u64,
}

/// Counters describing how lookups were served.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    coalesced: Arc<AtomicU64>,
    failed_fetches: Arc<AtomicU64>,
}

impl CacheStats {
    /// Lookups answered from a fresh entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that started a new fetch.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Lookups that joined a fetch already in flight.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Fetches that completed with an error.
    pub fn failed_fetches(&self) -> u64 {
        self.failed_fetches.load(Ordering::Relaxed)
    }

    /// Fraction of lookups served without a new fetch (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = (self.hits() + self.coalesced()) as f64;
        let total = served + self.misses() as f64;

        if total == 0.0 {
            0.0
        } else {
            served / total
        }
    }
}

enum Lookup<V> {
    Fresh(V),
    Pending(SharedFetch<V>),
}

/// A read-through cache keyed by string with time-based freshness.
///
/// Cloning is cheap and clones share the same entries, in-flight table and stats.
/// The payload type only needs to be `Clone`; wrap large payloads in `Arc`.
///
/// ```ignore
/// let cache = ReadThroughCache::<Arc<Quote>>::new(Duration::from_secs(300));
/// let quote = cache
///     .get("price_bitcoin", || async { fetch_quote("bitcoin").await })
///     .await?;
/// ```
pub struct ReadThroughCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
    ttl: Duration,
    stats: CacheStats,
}

impl<V> Clone for ReadThroughCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            ttl: self.ttl,
            stats: self.stats.clone(),
        }
    }
}

fn lock<V>(state: &Mutex<CacheState<V>>) -> MutexGuard<'_, CacheState<V>> {
    // Critical sections never panic midway, so a poisoned lock still guards consistent maps.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Check that a key is non-empty and uses only the allowed characters.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if KEY_PATTERN.is_match(key) {
        Ok(())
    } else {
        Err(CacheError::InvalidKey(key.to_string()))
    }
}

impl<V> ReadThroughCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache whose entries stay fresh for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_fetch_id: 0,
            })),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Return the payload for `key`, fetching it when missing or stale.
    ///
    /// `fetch` is only called when no fresh entry exists and no other fetch
    /// for `key` is already running; in that case the caller waits on the
    /// running fetch instead. A failed fetch leaves any stored entry as it was.
    ///
    /// Fetches are spawned on the tokio runtime and run to completion even
    /// if the caller stops waiting.
    pub async fn get<F, Fut>(&self, key: &str, fetch: F) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        validate_key(key)?;

        let pending = match self.lookup_or_start(key, fetch) {
            Lookup::Fresh(payload) => return Ok(payload),
            Lookup::Pending(pending) => pending,
        };

        pending.await.map_err(CacheError::Fetch)
    }

    /// Fetch or serve every key, returning payloads in input order.
    ///
    /// Per-key lookups run concurrently. The first failure fails the whole
    /// call; fetches that already succeeded are still cached.
    pub async fn get_many<K, F, Fut>(&self, keys: &[K], fetch_for: F) -> CacheResult<Vec<V>>
    where
        K: AsRef<str>,
        F: Fn(&str) -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let lookups = keys.iter().map(|key| {
            let key = key.as_ref();
            self.get(key, || fetch_for(key))
        });

        futures::future::try_join_all(lookups).await
    }

    /// Decide under the lock whether to serve, join or start a fetch.
    fn lookup_or_start<F, Fut>(&self, key: &str, fetch: F) -> Lookup<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let mut state = lock(&self.state);

        if let Some(entry) = state.entries.get(key) {
            if entry.fetched_at.elapsed() < self.ttl {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "Cache hit");
                return Lookup::Fresh(entry.payload.clone());
            }
        }

        if let Some(pending) = state.in_flight.get(key) {
            self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Joining in-flight fetch");
            return Lookup::Pending(pending.future.clone());
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Cache miss, fetching");

        let id = state.next_fetch_id;
        state.next_fetch_id += 1;

        // The fetch runs as its own task so it completes and records its
        // outcome even when every waiter has gone away.
        let task = tokio::spawn(Self::record_outcome(
            Arc::downgrade(&self.state),
            self.stats.clone(),
            key.to_string(),
            id,
            fetch(),
        ));

        let future = task
            .map(|joined| {
                joined.unwrap_or_else(|e| Err(FetchError::new(format!("fetch task failed: {}", e))))
            })
            .boxed()
            .shared();

        state.in_flight.insert(
            key.to_string(),
            PendingFetch {
                id,
                future: future.clone(),
            },
        );

        Lookup::Pending(future)
    }

    /// Run a fetch and write its outcome back into the cache.
    ///
    /// The entry is stamped when the fetch completes. A panicking fetch is
    /// reported as a failure so its in-flight marker is still removed.
    async fn record_outcome<Fut>(
        state: Weak<Mutex<CacheState<V>>>,
        stats: CacheStats,
        key: String,
        id: u64,
        fetch: Fut,
    ) -> Result<V, FetchError>
    where
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let result = match AssertUnwindSafe(fetch).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(FetchError::new("fetch panicked")),
        };

        if let Some(state) = state.upgrade() {
            let mut state = lock(&state);

            if state.in_flight.get(&key).map(|p| p.id) == Some(id) {
                state.in_flight.remove(&key);
            }

            match &result {
                Ok(payload) => {
                    state.entries.insert(
                        key,
                        CacheEntry {
                            payload: payload.clone(),
                            fetched_at: Instant::now(),
                        },
                    );
                }
                Err(e) => {
                    stats.failed_fetches.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %e, "Fetch failed, keeping previous entry");
                }
            }
        }

        result
    }

    /// Get the payload for `key` if it is fresh, without fetching.
    pub fn peek(&self, key: &str) -> Option<V> {
        let state = lock(&self.state);
        state
            .entries
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.payload.clone())
    }

    /// Get whatever payload is stored for `key`, however old.
    ///
    /// Meant for fallback reads after `get` has failed.
    pub fn get_stale(&self, key: &str) -> Option<V> {
        let state = lock(&self.state);
        state.entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Age of the stored entry for `key`.
    pub fn age(&self, key: &str) -> Option<Duration> {
        let state = lock(&self.state);
        state.entries.get(key).map(|entry| entry.fetched_at.elapsed())
    }

    /// Remove the stored entry for `key`. A fetch in flight is not affected.
    pub fn invalidate(&self, key: &str) {
        lock(&self.state).entries.remove(key);
    }

    /// Remove all stored entries.
    pub fn clear(&self) {
        lock(&self.state).entries.clear();
    }

    /// Remove all entries older than the TTL.
    ///
    /// Optional, since stale entries are ignored by `get()` anyway.
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        lock(&self.state)
            .entries
            .retain(|_, entry| entry.fetched_at.elapsed() < ttl);
    }

    /// Get the number of stored entries (including stale ones).
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetches currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }

    /// Get the TTL duration for this cache.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lookup counters shared by all clones of this cache.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<V> std::fmt::Debug for ReadThroughCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ReadThroughCache")
            .field("ttl", &self.ttl)
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<&'static str, FetchError>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_get_fetches_then_serves_from_cache() {
        let cache = ReadThroughCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get("key1", counting_fetch(&calls, "value1")).await;
        let second = cache.get("key1", counting_fetch(&calls, "value2")).await;

        assert_eq!(first, Ok("value1"));
        assert_eq!(second, Ok("value1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiration() {
        let cache = ReadThroughCache::new(Duration::from_secs(1));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("key1", counting_fetch(&calls, "value1")).await.unwrap();
        assert_eq!(cache.peek("key1"), Some("value1"));

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert_eq!(cache.peek("key1"), None);
        assert_eq!(cache.get_stale("key1"), Some("value1"));

        let refreshed = cache.get("key1", counting_fetch(&calls, "value2")).await;
        assert_eq!(refreshed, Ok("value2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_key_skips_fetch() {
        let cache: ReadThroughCache<&'static str> = ReadThroughCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["", " price", "price bitcoin", "_leading", "a/b"] {
            let result = cache.get(key, counting_fetch(&calls, "value")).await;
            assert_eq!(result, Err(CacheError::InvalidKey(key.to_string())));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_reported_as_failure() {
        let cache: ReadThroughCache<&'static str> = ReadThroughCache::new(Duration::from_secs(60));

        let result = cache
            .get("key1", || async {
                let missing: Option<&'static str> = None;
                Ok(missing.expect("no value"))
            })
            .await;

        assert_eq!(result, Err(CacheError::Fetch(FetchError::new("fetch panicked"))));
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().failed_fetches(), 1);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("price_bitcoin").is_ok());
        assert!(validate_key("history_usd-coin_30").is_ok());
        assert!(validate_key("ns:key.v2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("-dash").is_err());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = ReadThroughCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("key1", counting_fetch(&calls, "value1")).await.unwrap();
        cache.get("key2", counting_fetch(&calls, "value2")).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate("key1");
        assert_eq!(cache.peek("key1"), None);
        assert_eq!(cache.peek("key2"), Some("value2"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired() {
        let cache = ReadThroughCache::new(Duration::from_secs(1));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("key1", counting_fetch(&calls, "value1")).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;
        cache.get("key2", counting_fetch(&calls, "value2")).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;

        // Still 2 entries (expired but not cleaned up)
        assert_eq!(cache.len(), 2);

        cache.cleanup_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("key2"), Some("value2"));
    }

    #[tokio::test]
    async fn test_clone_cache_shares_entries() {
        let cache1 = ReadThroughCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        cache1.get("key1", counting_fetch(&calls, "value1")).await.unwrap();

        let cache2 = cache1.clone();
        assert_eq!(cache2.peek("key1"), Some("value1"));

        cache2.get("key2", counting_fetch(&calls, "value2")).await.unwrap();
        assert_eq!(cache1.peek("key2"), Some("value2"));
        assert_eq!(cache1.stats().misses(), 2);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.hits.fetch_add(2, Ordering::Relaxed);
        stats.misses.fetch_add(1, Ordering::Relaxed);
        assert!((stats.hit_rate() - 0.6667).abs() < 0.001);
    }

    #[test]
    fn test_debug_format() {
        let cache: ReadThroughCache<String> = ReadThroughCache::new(Duration::from_secs(60));

        let debug_str = format!("{:?}", cache);
        assert!(debug_str.contains("ReadThroughCache"));
        assert!(debug_str.contains("ttl"));
        assert!(debug_str.contains("in_flight"));
    }
}
