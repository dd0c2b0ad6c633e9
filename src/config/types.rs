use serde::Deserialize;

/// Main configuration structure for the crawler
///
/// Every section and key has a default, so an empty (or absent) config file
/// produces a usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub api: ApiConfig,
    pub geocoding: GeocodingConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// WikiTree id the crawl starts from
    pub start_id: String,

    /// Minimum time between two API requests (milliseconds)
    pub request_delay_ms: u64,

    /// Maximum retries for transient network failures
    pub max_retries: u32,

    /// Ceiling for a single server-directed `Retry-After` wait (seconds)
    pub max_retry_after_secs: u64,

    /// Whether fathers and mothers are queued as well as spouses and children
    pub crawl_parents: bool,

    /// Log progress every N processed queue items
    pub save_interval: u64,

    /// Write a checkpoint export every time the person count crosses a multiple of this
    pub export_interval: u64,

    /// Depth of the descendant tree fetched around the seed
    pub descendant_depth: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            // Bishop Henry Funck
            start_id: "Funck-6".to_string(),
            request_delay_ms: 1000,
            max_retries: 3,
            max_retry_after_secs: 300,
            crawl_parents: false,
            save_interval: 25,
            export_interval: 1000,
            descendant_depth: 2,
        }
    }
}

/// WikiTree API identification
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Full URL of the `api.php` endpoint
    pub endpoint: String,

    /// Application id sent with every request
    pub app_id: String,

    pub user_agent: String,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.wikitree.com/api.php".to_string(),
            app_id: "FunkFamilyTreeCrawler".to_string(),
            user_agent: "FunkFamilyTreeCrawler/2.0 (genealogy research project)".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Mapbox geocoding configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GeocodingConfig {
    /// Master switch; `crawl --no-geocode` turns it off for one run
    pub enabled: bool,

    /// Mapbox access token. `MAPBOX_ACCESS_TOKEN` overrides it.
    pub mapbox_token: Option<String>,

    pub endpoint: String,

    /// Country bias passed to Mapbox
    pub country: String,

    /// Minimum time between two geocoding requests (milliseconds)
    pub rate_limit_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mapbox_token: None,
            endpoint: "https://api.mapbox.com/geocoding/v5/mapbox.places".to_string(),
            country: "US".to_string(),
            rate_limit_ms: 100,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Destination of checkpoint and final exports
    pub export_path: String,

    /// Directory holding timestamped backups
    pub backup_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "data/funk-tree.db".to_string(),
            export_path: "data/funk-tree-export.db".to_string(),
            backup_dir: "data/backups".to_string(),
        }
    }
}
