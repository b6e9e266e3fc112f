//! Error types for the portfolio tracker.
//!
//! This module defines custom error types using `thiserror` for precise error handling.

use std::fmt;
use thiserror::Error;

/// Errors that can occur when talking to the market data API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Response parsed but lacks a field we rely on
    #[error("Missing field in API response: {0}")]
    MissingField(String),

    /// Network timeout
    #[error("Request timeout")]
    Timeout,

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication failed
    #[error("Authentication failed")]
    Unauthorized,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl ApiError {
    /// HTTP status associated with this error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            ApiError::Unauthorized => Some(401),
            ApiError::RateLimitExceeded => Some(429),
            _ => None,
        }
    }
}

/// Failure reported by a fetch operation handed to the cache.
///
/// Cloneable so a single failed fetch can be delivered to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    /// HTTP status when the failure came from a non-success response
    pub status: Option<u16>,

    /// Human readable description
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "fetch failed (status {}): {}", status, self.message),
            None => write!(f, "fetch failed: {}", self.message),
        }
    }
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Errors returned by the read-through cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key is empty or contains characters outside the allowed set
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// The underlying fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Errors raised by portfolio aggregation instead of producing non-finite numbers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    /// An input value is NaN, infinite or negative where that makes no sense
    #[error("Invalid {field} for asset {asset}: {value}")]
    InvalidInput {
        asset: String,
        field: &'static str,
        value: f64,
    },

    /// A derived quantity overflowed
    #[error("Computed {0} is not finite")]
    NonFiniteResult(&'static str),
}

/// Convenience type alias for Results with ApiError
pub type ApiResult<T> = Result<T, ApiError>;

/// Convenience type alias for Results with CacheError
pub type CacheResult<T> = Result<T, CacheError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for Results with ComputationError
pub type ComputationResult<T> = Result<T, ComputationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::NotFound("coin".to_string());
        assert_eq!(err.to_string(), "Resource not found: coin");

        let err = ConfigError::InvalidValue {
            var: "CHART_PERIOD".to_string(),
            reason: "unknown".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for CHART_PERIOD: unknown");

        let err = CacheError::InvalidKey(String::new());
        assert_eq!(err.to_string(), "Invalid cache key: \"\"");

        let err = ComputationError::NonFiniteResult("daily change");
        assert_eq!(err.to_string(), "Computed daily change is not finite");
    }

    #[test]
    fn test_api_error_variants() {
        let err = ApiError::ApiError {
            status: 503,
            message: "Service unavailable".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service unavailable"));
        assert_eq!(err.status(), Some(503));
        assert_eq!(ApiError::Timeout.status(), None);
    }

    #[test]
    fn test_fetch_error_from_api_error() {
        let err: FetchError = ApiError::RateLimitExceeded.into();
        assert_eq!(err.status, Some(429));
        assert_eq!(err.message, "Rate limit exceeded");
        assert_eq!(err.to_string(), "fetch failed (status 429): Rate limit exceeded");

        let err: FetchError = ApiError::HttpError("Connection failed".to_string()).into();
        assert_eq!(err.status, None);
        assert_eq!(
            err.to_string(),
            "fetch failed: HTTP request failed: Connection failed"
        );
    }

    #[test]
    fn test_cache_error_is_transparent_over_fetch() {
        let err = CacheError::from(FetchError::with_status(500, "boom"));
        assert_eq!(err.to_string(), "fetch failed (status 500): boom");
    }
}
