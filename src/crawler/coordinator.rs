//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop, which runs in phases:
//! - Recovery: return rows left processing by a dead run to pending
//! - Seed: fetch and store the seed profile unless already stored
//! - Seed expansion: queue the seed's descendants
//! - Drain: fetch queued profiles until no pending rows remain
//! - Done: close the run and write the final export
//!
//! Relatives found on each profile are queued with spouses ahead of
//! children (and parents ahead of both when enabled). Progress is logged
//! periodically and a checkpoint export is written whenever the person count
//! crosses a multiple of the export interval.

use crate::api::{Profile, ProfileSource};
use crate::config::{Config, CrawlerConfig};
use crate::geocode::{geocode_location, Geocoder};
use crate::storage::{CrawlStore, QueueStats, RunStatus};
use crate::transform::{is_valid_id, profile_to_person, relatives_of, CHILD_PRIORITY};
use crate::CrawlerError;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Queue error message for ids WikiTree does not know
pub const NOT_FOUND_MESSAGE: &str = "Profile not found";

/// Totals reported at the end of a crawl (or at interruption)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub seed_id: String,
    pub run_id: Option<i64>,
    /// Persons stored in the database
    pub total_persons: u64,
    /// HTTP requests sent to the profile API
    pub request_count: u64,
    /// Queue items processed by this run
    pub processed: u64,
    /// Queue items that failed for reasons other than not-found
    pub errors: u64,
    /// Queue items whose profile does not exist
    pub not_found: u64,
    /// Rows recovered from an interrupted run
    pub reset_count: u64,
    pub queue: QueueStats,
    pub elapsed: Duration,
}

/// How a crawl ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The queue drained
    Completed(CrawlSummary),

    /// The shutdown signal fired; all state is preserved for resumption
    Interrupted(CrawlSummary),
}

impl CrawlOutcome {
    pub fn summary(&self) -> &CrawlSummary {
        match self {
            Self::Completed(summary) | Self::Interrupted(summary) => summary,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Per-run counters
#[derive(Debug, Default)]
struct Progress {
    processed: u64,
    errors: u64,
    not_found: u64,
    reset_count: u64,
    last_export_threshold: u64,
}

/// Result of handling one queue item
enum ItemOutcome {
    Completed,
    NotFound,
}

/// Largest multiple of `interval` not above `persons`
pub fn checkpoint_threshold(persons: u64, interval: u64) -> u64 {
    if interval == 0 {
        return 0;
    }
    (persons / interval) * interval
}

/// Main crawler coordinator structure
pub struct Coordinator<P, G, S> {
    config: CrawlerConfig,
    seed_id: String,
    export_path: PathBuf,
    config_hash: String,
    source: P,
    geocoder: G,
    store: S,
    run_id: Option<i64>,
    progress: Progress,
}

impl<P, G, S> Coordinator<P, G, S>
where
    P: ProfileSource,
    G: Geocoder,
    S: CrawlStore,
{
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `source` - Where profiles are fetched from
    /// * `geocoder` - Used for inline geocoding of birth and death places
    /// * `store` - Persons, queue, geocode cache, snapshots and run ledger
    pub fn new(config: &Config, source: P, geocoder: G, store: S) -> Self {
        Self {
            config: config.crawler.clone(),
            seed_id: config.crawler.start_id.clone(),
            export_path: PathBuf::from(&config.output.export_path),
            config_hash: String::new(),
            source,
            geocoder,
            store,
            run_id: None,
            progress: Progress::default(),
        }
    }

    /// Overrides the configured seed id
    pub fn with_seed(mut self, seed_id: impl Into<String>) -> Self {
        self.seed_id = seed_id.into();
        self
    }

    /// Sets the configuration hash recorded on the run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn seed_id(&self) -> &str {
        &self.seed_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Runs the crawl to completion
    pub async fn run(&mut self) -> Result<CrawlOutcome, CrawlerError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the crawl until it completes or `shutdown` resolves
    ///
    /// On shutdown the crawl is dropped at its current await point. Every
    /// store write is synchronous, so nothing is half-written: the item being
    /// fetched stays in processing and is recovered by the next run.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlOutcome, CrawlerError>
    where
        F: Future,
    {
        let started = Instant::now();

        let finished = tokio::select! {
            biased;
            _ = shutdown => None,
            result = self.crawl(started) => Some(result),
        };

        match finished {
            Some(Ok(summary)) => Ok(CrawlOutcome::Completed(summary)),
            Some(Err(e)) => {
                if let Some(run_id) = self.run_id {
                    if let Err(mark_err) = self.store.finish_run(run_id, RunStatus::Failed) {
                        warn!(run_id = run_id, "Failed to record failed run: {}", mark_err);
                    }
                }
                Err(e)
            }
            None => {
                info!(
                    seed = %self.seed_id,
                    processed = self.progress.processed,
                    "Interrupted; crawl state is preserved and the next run resumes from the queue"
                );
                Ok(CrawlOutcome::Interrupted(self.summary(started)?))
            }
        }
    }

    async fn crawl(&mut self, started: Instant) -> Result<CrawlSummary, CrawlerError> {
        info!(seed = %self.seed_id, "Starting crawl");

        self.recover()?;
        self.fetch_seed().await?;
        self.expand_seed().await?;
        self.drain().await?;

        if let Some(run_id) = self.run_id {
            self.store.finish_run(run_id, RunStatus::Completed)?;
        }

        let summary = self.summary(started)?;
        info!(
            total_persons = summary.total_persons,
            request_count = summary.request_count,
            errors = summary.errors,
            not_found = summary.not_found,
            "Crawl complete"
        );

        info!(path = %self.export_path.display(), "Writing final export");
        self.export();

        Ok(summary)
    }

    /// Recovery phase: reset interrupted rows and open a new run
    fn recover(&mut self) -> Result<(), CrawlerError> {
        let reset = self.store.reset_processing()?;
        self.progress.reset_count = reset;
        if reset > 0 {
            info!(count = reset, "Reset interrupted queue items to pending");
        }

        let stale = self.store.mark_stale_runs_interrupted()?;
        if stale > 0 {
            debug!(count = stale, "Marked stale runs as interrupted");
        }

        let run_id = self.store.create_run(&self.seed_id, &self.config_hash)?;
        self.run_id = Some(run_id);
        debug!(run_id = run_id, "Recorded crawl run");
        Ok(())
    }

    /// Seed phase: fetch the seed profile unless it is already stored
    ///
    /// Failure here is fatal; there is nothing to crawl without a seed.
    async fn fetch_seed(&mut self) -> Result<(), CrawlerError> {
        let seed_id = self.seed_id.clone();

        if self.store.person_exists(&seed_id)? {
            info!(seed = %seed_id, "Seed profile already stored, resuming");
            return Ok(());
        }

        info!(seed = %seed_id, "Fetching seed profile");
        let mut profile =
            self.source
                .get_profile(&seed_id)
                .await
                .map_err(|source| CrawlerError::Seed {
                    wiki_id: seed_id.clone(),
                    source,
                })?;

        fill_missing_id(&mut profile, &seed_id);
        self.process_profile(&profile).await
    }

    /// Seed expansion phase: queue every descendant of the seed
    ///
    /// Descendant records carry a reduced field set, so each one is queued
    /// for a full fetch; only descendants not yet stored are written now.
    async fn expand_seed(&mut self) -> Result<(), CrawlerError> {
        let depth = self.config.descendant_depth;
        info!(seed = %self.seed_id, depth = depth, "Fetching descendants");

        let descendants = match self.source.get_descendants(&self.seed_id, depth).await {
            Ok(descendants) => descendants,
            Err(e) => {
                warn!(seed = %self.seed_id, "Failed to fetch descendants: {}", e);
                return Ok(());
            }
        };

        let mut queued = 0;
        for descendant in &descendants {
            let Some(wiki_id) = descendant.name.as_deref().map(str::trim) else {
                continue;
            };
            if !is_valid_id(Some(wiki_id)) || wiki_id == self.seed_id {
                continue;
            }

            match self.store.enqueue(wiki_id, CHILD_PRIORITY) {
                Ok(true) => queued += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(wiki_id = %wiki_id, "Failed to queue descendant: {}", e);
                    continue;
                }
            }

            match self.store.person_exists(wiki_id) {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    warn!(wiki_id = %wiki_id, "Failed to check stored descendant: {}", e);
                    continue;
                }
            }
            if let Err(e) = self.process_profile(descendant).await {
                warn!(wiki_id = %wiki_id, "Failed to process descendant: {}", e);
            }
        }

        let pending = self.store.queue_stats()?.pending;
        info!(
            descendants = descendants.len(),
            queued = queued,
            pending = pending,
            "Crawling queue"
        );
        Ok(())
    }

    /// Drain phase: process queued profiles until none are pending
    async fn drain(&mut self) -> Result<(), CrawlerError> {
        while let Some(item) = self.store.dequeue()? {
            let wiki_id = item.wiki_id;
            debug!(wiki_id = %wiki_id, priority = item.priority, "Fetching");

            match self.process_queue_item(&wiki_id).await {
                Ok(ItemOutcome::Completed) => {}
                Ok(ItemOutcome::NotFound) => {
                    info!(wiki_id = %wiki_id, "Profile not found");
                    self.progress.not_found += 1;
                }
                Err(e) => {
                    error!(wiki_id = %wiki_id, "Error processing queue item: {}", e);
                    self.progress.errors += 1;
                    self.store.mark_error(&wiki_id, &e.to_string())?;
                }
            }

            self.progress.processed += 1;
            if self.progress.processed % self.config.save_interval.max(1) == 0 {
                self.report_progress()?;
            }
        }

        Ok(())
    }

    async fn process_queue_item(&mut self, wiki_id: &str) -> Result<ItemOutcome, CrawlerError> {
        match self.source.get_profile(wiki_id).await {
            Ok(mut profile) => {
                fill_missing_id(&mut profile, wiki_id);
                self.process_profile(&profile).await?;
                self.store.mark_completed(wiki_id)?;
                Ok(ItemOutcome::Completed)
            }
            Err(e) if e.is_not_found() => {
                self.store.mark_error(wiki_id, NOT_FOUND_MESSAGE)?;
                Ok(ItemOutcome::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores a profile, geocodes its places and queues its relatives
    async fn process_profile(&mut self, profile: &Profile) -> Result<(), CrawlerError> {
        let Some(person) = profile_to_person(profile) else {
            warn!("Profile has no valid WikiTree id, skipping");
            return Ok(());
        };

        self.store.upsert_person(&person)?;

        geocode_location(
            &self.geocoder,
            &mut self.store,
            person.birth_location.as_deref(),
        )
        .await;
        geocode_location(
            &self.geocoder,
            &mut self.store,
            person.death_location.as_deref(),
        )
        .await;

        self.enqueue_relatives(profile)?;
        Ok(())
    }

    /// Queues relatives that are neither stored nor already queued
    fn enqueue_relatives(&mut self, profile: &Profile) -> Result<usize, CrawlerError> {
        let mut batch = Vec::new();
        for relative in relatives_of(profile, self.config.crawl_parents) {
            if self.store.person_exists(&relative.wiki_id)?
                || self.store.is_queued(&relative.wiki_id)?
            {
                continue;
            }
            batch.push((relative.wiki_id, relative.priority));
        }

        if batch.is_empty() {
            return Ok(0);
        }

        let inserted = self.store.enqueue_batch(&batch)?;
        debug!(count = inserted, "Queued relatives");
        Ok(inserted)
    }

    /// Logs progress and writes a checkpoint export when a threshold is crossed
    fn report_progress(&mut self) -> Result<(), CrawlerError> {
        let persons = self.store.count_persons()?;
        let stats = self.store.queue_stats()?;
        info!(
            persons = persons,
            pending = stats.pending,
            processed = self.progress.processed,
            "Progress: {} profiles, {} in queue",
            persons,
            stats.pending
        );

        let threshold = checkpoint_threshold(persons, self.config.export_interval);
        if threshold > self.progress.last_export_threshold {
            info!(
                threshold = threshold,
                "Export threshold reached, writing checkpoint export"
            );
            self.export();
            self.progress.last_export_threshold = threshold;
        }

        Ok(())
    }

    /// Writes an export; failures are logged and the crawl continues
    fn export(&self) {
        match self.store.dump(&self.export_path) {
            Ok(bytes) => info!(
                path = %self.export_path.display(),
                bytes = bytes,
                "Export written"
            ),
            Err(e) => warn!(
                path = %self.export_path.display(),
                "Export failed (will retry at next checkpoint): {}",
                e
            ),
        }
    }

    fn summary(&self, started: Instant) -> Result<CrawlSummary, CrawlerError> {
        Ok(CrawlSummary {
            seed_id: self.seed_id.clone(),
            run_id: self.run_id,
            total_persons: self.store.count_persons()?,
            request_count: self.source.request_count(),
            processed: self.progress.processed,
            errors: self.progress.errors,
            not_found: self.progress.not_found,
            reset_count: self.progress.reset_count,
            queue: self.store.queue_stats()?,
            elapsed: started.elapsed(),
        })
    }
}

/// Uses the requested id when the API omits it from the profile
fn fill_missing_id(profile: &mut Profile, wiki_id: &str) {
    let missing = profile
        .name
        .as_deref()
        .map_or(true, |name| name.trim().is_empty());
    if missing {
        profile.name = Some(wiki_id.to_string());
    }
}
