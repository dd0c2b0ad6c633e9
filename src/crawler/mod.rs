//! Crawler module for the genealogy crawl
//!
//! This module contains the crawl orchestration:
//! - Crash recovery of interrupted queue items
//! - Seed resolution and descendant expansion
//! - Priority-ordered draining of the work queue
//! - Periodic progress logging and checkpoint exports

mod coordinator;

pub use coordinator::{
    checkpoint_threshold, Coordinator, CrawlOutcome, CrawlSummary, NOT_FOUND_MESSAGE,
};

use crate::api::WikiTreeClient;
use crate::config::Config;
use crate::geocode::MapboxGeocoder;
use crate::storage::open_storage;
use crate::CrawlerError;
use std::future::Future;
use std::path::Path;

/// Runs a complete crawl against the live WikiTree API
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open (or create) the database at `output.database-path`
/// 2. Build the WikiTree client and the Mapbox geocoder
/// 3. Crawl from `seed_id` (or the configured start id) until the queue
///    drains or `shutdown` resolves
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration text, recorded on the run
/// * `seed_id` - Overrides `crawler.start-id` when given
/// * `shutdown` - Resolving this future interrupts the crawl
///
/// # Returns
///
/// * `Ok(CrawlOutcome)` - The crawl completed or was interrupted
/// * `Err(CrawlerError)` - Setup failed or the crawl hit a fatal error
pub async fn run_crawl<F>(
    config: &Config,
    config_hash: &str,
    seed_id: Option<&str>,
    shutdown: F,
) -> Result<CrawlOutcome, CrawlerError>
where
    F: Future,
{
    let store = open_storage(Path::new(&config.output.database_path))?;
    let client = WikiTreeClient::new(&config.api, &config.crawler)?;
    let geocoder = MapboxGeocoder::new(&config.geocoding, &config.api)?;

    let mut coordinator =
        Coordinator::new(config, client, geocoder, store).with_config_hash(config_hash);
    if let Some(seed_id) = seed_id {
        coordinator = coordinator.with_seed(seed_id);
    }

    coordinator.run_until(shutdown).await
}
