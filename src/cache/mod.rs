//! Caching utilities for the portfolio tracker.
//!
//! This module provides a generic read-through cache with TTL support and
//! per-key coalescing of concurrent fetches.

pub mod read_through;

pub use read_through::{validate_key, CacheStats, ReadThroughCache};
