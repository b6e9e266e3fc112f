//! Asset search for filtering portfolio positions.
//!
//! This module provides the search-box filter over positions:
//! - Case-insensitive substring matching on symbol, name and coin id
//! - Levenshtein-based fuzzy matching on name and id to tolerate typos
//! - Confidence scoring (0-100 scale)

use crate::models::AssetPosition;

/// Minimum confidence for a position to pass the filter.
pub const DEFAULT_MIN_CONFIDENCE: u8 = 60;

/// A position that matched a query, with its confidence score.
#[derive(Debug, Clone)]
pub struct AssetMatch<'a> {
    pub position: &'a AssetPosition,

    /// Confidence score (0-100, where 100 is an exact symbol match)
    pub confidence: u8,
}

/// Filters positions by a free-text query.
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    min_confidence: u8,
}

impl Default for AssetMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl AssetMatcher {
    pub fn new(min_confidence: u8) -> Self {
        Self { min_confidence }
    }

    /// Keep the positions matching `query`, preserving input order.
    ///
    /// An empty or whitespace-only query keeps every position.
    pub fn filter<'a>(&self, positions: &'a [AssetPosition], query: &str) -> Vec<&'a AssetPosition> {
        self.matches(positions, query)
            .into_iter()
            .map(|m| m.position)
            .collect()
    }

    /// Score every position against `query`, keeping those above the threshold.
    pub fn matches<'a>(&self, positions: &'a [AssetPosition], query: &str) -> Vec<AssetMatch<'a>> {
        let query = Self::normalize(query);

        positions
            .iter()
            .filter_map(|position| {
                let confidence = if query.is_empty() {
                    100
                } else {
                    Self::score(&query, position)
                };

                (confidence >= self.min_confidence).then_some(AssetMatch {
                    position,
                    confidence,
                })
            })
            .collect()
    }

    /// Best score of the query against the position's symbol, name and id.
    fn score(query: &str, position: &AssetPosition) -> u8 {
        if Self::normalize(&position.symbol) == query {
            return 100;
        }

        [&position.name, &position.id, &position.symbol]
            .into_iter()
            .map(|field| Self::calculate_fuzzy_score(query, &Self::normalize(field)))
            .max()
            .unwrap_or(0)
    }

    /// Score a normalized query against a normalized target.
    ///
    /// Returns 95 for an exact match, 70-95 for a substring match and up to 85
    /// for a close typo; 0 when the strings are too different.
    fn calculate_fuzzy_score(query: &str, target: &str) -> u8 {
        if query.is_empty() || target.is_empty() {
            return 0;
        }

        if query == target {
            return 95;
        }

        if target.contains(query) {
            let ratio = query.len() as f64 / target.len() as f64;
            return (25.0 * ratio + 70.0) as u8;
        }

        let distance = Self::levenshtein_distance(query, target);
        let max_len = query.chars().count().max(target.chars().count());

        if distance as f64 / max_len as f64 > 0.34 {
            return 0;
        }

        let similarity = 1.0 - (distance as f64 / max_len as f64);
        (similarity * 85.0) as u8
    }

    /// Calculate Levenshtein distance between two strings.
    fn levenshtein_distance(s1: &str, s2: &str) -> usize {
        let s1_chars: Vec<char> = s1.chars().collect();
        let s2_chars: Vec<char> = s2.chars().collect();

        if s1_chars.is_empty() {
            return s2_chars.len();
        }
        if s2_chars.is_empty() {
            return s1_chars.len();
        }

        // Two rolling rows instead of the full matrix
        let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
        let mut current = vec![0; s2_chars.len() + 1];

        for (i, c1) in s1_chars.iter().enumerate() {
            current[0] = i + 1;
            for (j, c2) in s2_chars.iter().enumerate() {
                let cost = if c1 == c2 { 0 } else { 1 };
                current[j + 1] = (previous[j + 1] + 1)
                    .min(current[j] + 1)
                    .min(previous[j] + cost);
            }
            std::mem::swap(&mut previous, &mut current);
        }

        previous[s2_chars.len()]
    }

    /// Lowercase and trim for comparison.
    pub fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }
}
