#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sync and backfill result types.

use chrono::NaiveDate;
use fire_map_fire_models::FeedProduct;
use serde::{Deserialize, Serialize};

/// What happened to a single candidate during merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeOutcome {
    /// No stored sighting of the event; a new row was written.
    Inserted,
    /// A stored sighting had lower confidence and was updated.
    Updated,
    /// A stored sighting had equal or higher confidence; nothing changed.
    Unchanged,
    /// The store rejected the candidate.
    Failed,
}

/// Per-outcome counters for a batch of candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCounts {
    /// Candidates received from the feed.
    pub fetched: u64,
    /// New rows written.
    pub inserted: u64,
    /// Existing rows improved.
    pub updated: u64,
    /// Candidates that changed nothing.
    pub unchanged: u64,
    /// Candidates the store rejected.
    pub failed: u64,
}

impl MergeCounts {
    /// Records one merged candidate.
    pub const fn record(&mut self, outcome: MergeOutcome) {
        self.fetched += 1;
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
            MergeOutcome::Failed => self.failed += 1,
        }
    }

    /// Adds another set of counters into this one.
    pub const fn absorb(&mut self, other: &Self) {
        self.fetched += other.fetched;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}

/// Result of syncing one region for one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSyncReport {
    /// Region id.
    pub region: String,
    /// Merge counters across every product.
    pub counts: MergeCounts,
    /// Products that were requested.
    pub products_attempted: Vec<FeedProduct>,
    /// Products whose fetch failed.
    pub failed_products: Vec<FeedProduct>,
}

/// Result of one sync run (a single day or a trailing window).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Anchor date, or `None` for a trailing window ending today.
    pub date: Option<NaiveDate>,
    /// Number of days covered.
    pub window_days: u8,
    /// Per-region results, in processing order.
    pub regions: Vec<RegionSyncReport>,
}

impl SyncReport {
    /// Counters summed over every region.
    #[must_use]
    pub fn totals(&self) -> MergeCounts {
        let mut totals = MergeCounts::default();
        for region in &self.regions {
            totals.absorb(&region.counts);
        }
        totals
    }

    /// Whether at least one product was requested and every request
    /// failed.
    #[must_use]
    pub fn all_fetches_failed(&self) -> bool {
        let attempted: usize = self
            .regions
            .iter()
            .map(|r| r.products_attempted.len())
            .sum();
        let failed: usize = self.regions.iter().map(|r| r.failed_products.len()).sum();
        attempted > 0 && failed == attempted
    }
}

/// Result of a historical backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
    /// One report per processed day.
    pub days: Vec<SyncReport>,
    /// Days on which every fetch failed.
    pub failed_days: Vec<NaiveDate>,
}

impl BackfillReport {
    /// Counters summed over every day.
    #[must_use]
    pub fn totals(&self) -> MergeCounts {
        let mut totals = MergeCounts::default();
        for day in &self.days {
            totals.absorb(&day.totals());
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(attempted: usize, failed: usize) -> RegionSyncReport {
        let products = FeedProduct::defaults();
        RegionSyncReport {
            region: "punjab".to_string(),
            counts: MergeCounts::default(),
            products_attempted: products[..attempted].to_vec(),
            failed_products: products[..failed].to_vec(),
        }
    }

    #[test]
    fn counts_record_each_outcome() {
        let mut counts = MergeCounts::default();
        counts.record(MergeOutcome::Inserted);
        counts.record(MergeOutcome::Inserted);
        counts.record(MergeOutcome::Updated);
        counts.record(MergeOutcome::Unchanged);
        counts.record(MergeOutcome::Failed);

        assert_eq!(counts.fetched, 5);
        assert_eq!(counts.inserted, 2);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn failed_day_requires_every_fetch_to_fail() {
        let report = |regions| SyncReport {
            date: None,
            window_days: 1,
            regions,
        };

        assert!(report(vec![region(3, 3)]).all_fetches_failed());
        assert!(!report(vec![region(3, 2)]).all_fetches_failed());
        assert!(!report(vec![region(3, 3), region(3, 0)]).all_fetches_failed());
        assert!(!report(vec![]).all_fetches_failed());
    }

    #[test]
    fn counts_serialize_camel_case() {
        let json = serde_json::to_value(SyncReport {
            date: NaiveDate::from_ymd_opt(2024, 10, 15),
            window_days: 1,
            regions: vec![region(1, 0)],
        })
        .unwrap();
        assert_eq!(json["windowDays"], 1);
        assert_eq!(json["regions"][0]["productsAttempted"][0], "MODIS_NRT");
    }
}
