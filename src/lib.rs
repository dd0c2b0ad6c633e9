//! Funk Tree Crawler: a resumable WikiTree genealogy crawler
//!
//! This crate walks the WikiTree profile API outward from a seed profile,
//! following parent, child and spouse links, and persists every person it
//! finds into a local SQLite database. The crawl respects the API's rate
//! limit, survives restarts, and never duplicates persons or queue entries.

pub mod api;
pub mod config;
pub mod crawler;
pub mod geocode;
pub mod output;
pub mod state;
pub mod storage;
pub mod transform;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Failed to resolve seed profile {wiki_id}: {source}")]
    Seed { wiki_id: String, source: ApiError },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No backups found in {0}")]
    NoBackups(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors returned by the remote profile API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Profile not found: {wiki_id}")]
    NotFound { wiki_id: String },

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Only transport failures are worth retrying with backoff.
    ///
    /// HTTP 429 is handled separately by the client and never surfaces here.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the geocoding provider. Never fatal to a crawl.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("MAPBOX_ACCESS_TOKEN is not configured")]
    MissingToken,

    #[error("Geocoding request failed for {location}: {message}")]
    Request { location: String, message: String },

    #[error("Geocoding provider returned {status} for {location}")]
    Status { location: String, status: u16 },

    #[error("Invalid geocoding response for {location}: {message}")]
    InvalidResponse { location: String, message: String },
}

impl GeocodeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for remote API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

// Re-export commonly used types
pub use api::{Profile, ProfileSource, WikiTreeClient};
pub use config::Config;
pub use crawler::{CrawlOutcome, CrawlSummary, Coordinator};
pub use state::QueueStatus;
pub use transform::normalize_location_key;
