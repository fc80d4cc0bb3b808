#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Satellite fire ingestion: fetch, parse, deduplicate and store.
//!
//! [`FireSyncService`] drives a [`FireFeed`] across regions, products and
//! dates and merges every candidate into the store one at a time, in
//! arrival order. A failing product is logged and skipped; a failing day
//! in a backfill is logged and the next day still runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use fire_map_database::{DbError, detections};
use fire_map_database_models::FireStats;
use fire_map_fire_models::FeedProduct;
use fire_map_geography::{GeoError, RegionTable};
use fire_map_geography_models::{Region, RegionSelection};
use fire_map_ingest_models::{
    BackfillReport, MergeCounts, MergeOutcome, RegionSyncReport, SyncReport,
};
use fire_map_source::{FireFeed, SourceError};
use fire_map_source_models::{FeedWindow, FireCandidate};
use switchy_database::Database;

/// Default pause between days of a backfill.
pub const DEFAULT_DAY_DELAY: Duration = Duration::from_secs(1);

/// Errors that abort a sync run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The requested region is not configured.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The feed cannot be used at all (e.g. missing API key).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A store-level operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Invalid sync parameters.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what is wrong.
        message: String,
    },
}

/// Tunables for [`FireSyncService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Products fetched for every region, in order.
    pub products: Vec<FeedProduct>,
    /// Pause after each backfill day.
    pub day_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            products: FeedProduct::defaults().to_vec(),
            day_delay: DEFAULT_DAY_DELAY,
        }
    }
}

impl SyncConfig {
    /// Reads `FIRE_MAP_PRODUCTS` and `FIRE_MAP_SYNC_DELAY_MS`, falling back
    /// to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(filter) = std::env::var("FIRE_MAP_PRODUCTS") {
            let products = parse_products(&filter);
            if products.is_empty() {
                log::warn!(
                    "No recognised products in FIRE_MAP_PRODUCTS={filter:?}. Using defaults: {}",
                    join_products(&config.products)
                );
            } else {
                config.products = products;
            }
        }

        if let Ok(delay) = std::env::var("FIRE_MAP_SYNC_DELAY_MS") {
            match delay.trim().parse::<u64>() {
                Ok(ms) => config.day_delay = Duration::from_millis(ms),
                Err(e) => log::warn!("Ignoring FIRE_MAP_SYNC_DELAY_MS={delay:?}: {e}"),
            }
        }

        config
    }
}

/// Parses a comma-separated product list, skipping (and logging) unknown
/// ids and duplicates.
#[must_use]
pub fn parse_products(list: &str) -> Vec<FeedProduct> {
    let mut products = Vec::new();

    for id in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match id.parse::<FeedProduct>() {
            Ok(product) if !products.contains(&product) => products.push(product),
            Ok(_) => {}
            Err(_) => log::warn!(
                "Unknown product {id:?}. Available: {}",
                join_products(FeedProduct::all())
            ),
        }
    }

    products
}

fn join_products(products: &[FeedProduct]) -> String {
    products
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(", ")
}

/// Merges one candidate into the store.
///
/// 1. No stored sighting of the same event: insert.
/// 2. Stored sighting with strictly lower confidence: update its readings.
/// 3. Otherwise: leave the store untouched.
///
/// # Errors
///
/// Returns [`DbError`] if the lookup or the write fails.
pub async fn merge_candidate(
    db: &dyn Database,
    candidate: &FireCandidate,
    now: DateTime<Utc>,
) -> Result<MergeOutcome, DbError> {
    match detections::find_near_duplicate(db, candidate).await? {
        None => {
            detections::insert(db, candidate, now).await?;
            Ok(MergeOutcome::Inserted)
        }
        Some(existing) if candidate.confidence > existing.confidence => {
            detections::update_readings(db, &existing.id, candidate, now).await?;
            Ok(MergeOutcome::Updated)
        }
        Some(_) => Ok(MergeOutcome::Unchanged),
    }
}

/// Merges a batch in order. A store error on one candidate is logged and
/// counted; the rest of the batch still runs.
pub async fn merge_candidates(db: &dyn Database, candidates: &[FireCandidate]) -> MergeCounts {
    let mut counts = MergeCounts::default();

    for candidate in candidates {
        let outcome = match merge_candidate(db, candidate, Utc::now()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!(
                    "Failed to store detection at ({}, {}) {} {}: {e}",
                    candidate.latitude,
                    candidate.longitude,
                    candidate.acq_date,
                    candidate.acq_time
                );
                MergeOutcome::Failed
            }
        };
        counts.record(outcome);
    }

    counts
}

/// Orchestrates feed fetches and merges across regions and dates.
#[derive(Clone)]
pub struct FireSyncService {
    feed: Arc<dyn FireFeed>,
    regions: Arc<RegionTable>,
    config: SyncConfig,
}

impl FireSyncService {
    /// Creates a service over a feed and the shared region table.
    #[must_use]
    pub fn new(feed: Arc<dyn FireFeed>, regions: Arc<RegionTable>, config: SyncConfig) -> Self {
        Self {
            feed,
            regions,
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Syncs a single calendar day.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the region is unknown or the feed is
    /// misconfigured. Per-product fetch failures are reported, not raised.
    pub async fn sync_day(
        &self,
        db: &dyn Database,
        selection: &RegionSelection,
        date: NaiveDate,
    ) -> Result<SyncReport, IngestError> {
        log::info!("Syncing fire data for {} on {date}", selection.label());
        self.sync_window(db, selection, FeedWindow::day(date)).await
    }

    /// Syncs the trailing `days` days (1-10) in one request per product.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidRequest`] for an out-of-range day
    /// count, otherwise as [`Self::sync_day`].
    pub async fn sync_recent(
        &self,
        db: &dyn Database,
        selection: &RegionSelection,
        days: u8,
    ) -> Result<SyncReport, IngestError> {
        let window = FeedWindow::trailing(days).ok_or_else(|| IngestError::InvalidRequest {
            message: format!(
                "days must be between 1 and {}, got {days}",
                FeedWindow::MAX_DAYS
            ),
        })?;
        log::info!(
            "Syncing fire data for {} over the last {days} day(s)",
            selection.label()
        );
        self.sync_window(db, selection, window).await
    }

    /// Syncs every day from `start` to `end` inclusive, one after another,
    /// pausing for the configured delay after each day.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the range is inverted, the region is
    /// unknown, or the feed is misconfigured. A day on which every fetch
    /// failed is recorded in [`BackfillReport::failed_days`] and the next
    /// day still runs.
    pub async fn backfill(
        &self,
        db: &dyn Database,
        selection: &RegionSelection,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BackfillReport, IngestError> {
        if start > end {
            return Err(IngestError::InvalidRequest {
                message: format!("start date {start} is after end date {end}"),
            });
        }

        // Resolve up front so an unknown region fails before any fetch
        self.regions.resolve(selection)?;

        let started = Instant::now();
        let total_days = (end - start).num_days() + 1;
        log::info!(
            "Backfilling {} from {start} to {end} ({total_days} day(s))",
            selection.label()
        );

        let mut report = BackfillReport {
            start,
            end,
            days: Vec::new(),
            failed_days: Vec::new(),
        };

        for (i, date) in start.iter_days().take_while(|d| *d <= end).enumerate() {
            let day = self.sync_day(db, selection, date).await?;

            if day.all_fetches_failed() {
                log::error!("[{}/{total_days}] {date}: every fetch failed", i + 1);
                report.failed_days.push(date);
            } else {
                let t = day.totals();
                log::info!(
                    "[{}/{total_days}] {date}: {} fetched, {} new, {} updated",
                    i + 1,
                    t.fetched,
                    t.inserted,
                    t.updated
                );
            }
            report.days.push(day);

            tokio::time::sleep(self.config.day_delay).await;
        }

        let totals = report.totals();
        log::info!(
            "Backfill complete in {:.1}s: {} fetched, {} new, {} updated, {} failed day(s)",
            started.elapsed().as_secs_f64(),
            totals.fetched,
            totals.inserted,
            totals.updated,
            report.failed_days.len()
        );

        Ok(report)
    }

    async fn sync_window(
        &self,
        db: &dyn Database,
        selection: &RegionSelection,
        window: FeedWindow,
    ) -> Result<SyncReport, IngestError> {
        let regions = self.regions.resolve(selection)?;

        let mut report = SyncReport {
            date: window.date(),
            window_days: window.days(),
            regions: Vec::with_capacity(regions.len()),
        };

        for region in regions {
            report.regions.push(self.sync_region(db, region, window).await?);
        }

        Ok(report)
    }

    async fn sync_region(
        &self,
        db: &dyn Database,
        region: &Region,
        window: FeedWindow,
    ) -> Result<RegionSyncReport, IngestError> {
        let mut report = RegionSyncReport {
            region: region.id.clone(),
            counts: MergeCounts::default(),
            products_attempted: Vec::with_capacity(self.config.products.len()),
            failed_products: Vec::new(),
        };

        for &product in &self.config.products {
            report.products_attempted.push(product);

            let candidates = match self
                .feed
                .fetch_candidates(product, &region.bounds, window)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) if e.is_configuration() => return Err(e.into()),
                Err(e) => {
                    log::error!("[{}] {product} fetch failed: {e}", region.id);
                    report.failed_products.push(product);
                    continue;
                }
            };

            let counts = merge_candidates(db, &candidates).await;
            log::info!(
                "[{}] {product}: {} fetched, {} new, {} updated",
                region.id,
                counts.fetched,
                counts.inserted,
                counts.updated
            );
            report.counts.absorb(&counts);
        }

        Ok(report)
    }
}

/// Aggregate detection counts, optionally scoped to one region.
///
/// `None`, `both` and `all` mean every stored detection.
///
/// # Errors
///
/// Returns [`IngestError`] if the region is unknown or a count query
/// fails.
pub async fn fire_stats(
    db: &dyn Database,
    regions: &RegionTable,
    region: Option<&str>,
    today: NaiveDate,
) -> Result<FireStats, IngestError> {
    let selection = RegionSelection::parse(region.unwrap_or_default());

    let stats = match &selection {
        RegionSelection::All => detections::stats(db, None, selection.label(), today).await?,
        RegionSelection::One(id) => {
            let region = regions.require(id)?;
            detections::stats(db, Some(&region.bounds), &region.id, today).await?
        }
    };

    Ok(stats)
}
