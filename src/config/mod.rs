//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every key has a default; the Mapbox token may also
//! come from the `MAPBOX_ACCESS_TOKEN` environment variable.
//!
//! # Example
//!
//! ```no_run
//! use funk_tree_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Request delay: {}ms", config.crawler.request_delay_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, CrawlerConfig, GeocodingConfig, OutputConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
    MAPBOX_TOKEN_ENV,
};
