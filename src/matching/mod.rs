//! Asset search and filtering.
//!
//! This module provides fuzzy matching of positions against a search query.

pub mod asset_matcher;

pub use asset_matcher::{AssetMatch, AssetMatcher};
