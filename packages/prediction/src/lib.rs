#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid fire risk predictions.
//!
//! A [`PredictionModel`] turns a region's recent detection history into a
//! list of per-cell probabilities. [`PredictionService`] loads the history,
//! runs the model, and stores the result so that later reads for the same
//! region, date and horizon are served from the store.

pub mod density;

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use fire_map_database::{DbError, detections, predictions};
use fire_map_database_models::{DateRange, DetectionQuery, FireDetectionRow, PredictionRow};
use fire_map_fire_models::RiskTier;
use fire_map_geography::{GeoError, RegionTable};
use fire_map_geography_models::Region;
use serde::{Deserialize, Serialize};
use switchy_database::Database;

pub use density::DensityModel;

/// Horizon used when a request names none.
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Longest accepted horizon.
pub const MAX_HORIZON_DAYS: u32 = 30;

/// Errors that can occur while producing predictions.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// Unknown region.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Store error.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Feature encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Horizon outside `1..=MAX_HORIZON_DAYS`.
    #[error("Invalid horizon {horizon}: must be between 1 and {MAX_HORIZON_DAYS} days")]
    InvalidHorizon {
        /// The requested horizon.
        horizon: i64,
    },
}

impl PredictionError {
    /// Whether the error was caused by the request rather than the system.
    #[must_use]
    pub const fn is_invalid_request(&self) -> bool {
        matches!(self, Self::Geo(_) | Self::InvalidHorizon { .. })
    }
}

/// One model output cell, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPrediction {
    /// Cell centre latitude.
    pub grid_lat: f64,
    /// Cell centre longitude.
    pub grid_lng: f64,
    /// Probability of fire within the horizon, 0 to 1.
    pub probability: f64,
    /// Model confidence in `probability`, 0 to 1.
    pub confidence: f64,
    /// Inputs that produced this cell, stored for inspection.
    pub features: serde_json::Value,
}

/// A fire risk model.
pub trait PredictionModel: Send + Sync {
    /// Identifier stored alongside each prediction.
    fn version(&self) -> &'static str;

    /// How many days of history before the prediction date the model
    /// wants.
    fn lookback_days(&self) -> u32;

    /// Scores the region for `horizon_days` after `date`.
    ///
    /// `history` holds every stored detection inside the region's bounds
    /// acquired within [`lookback_days`](Self::lookback_days) of `date`.
    fn predict(
        &self,
        region: &Region,
        date: NaiveDate,
        horizon_days: u32,
        history: &[FireDetectionRow],
    ) -> Vec<GridPrediction>;
}

/// Number of predictions in each risk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    /// Probability above 0.7.
    pub high: usize,
    /// Probability above 0.4 and at most 0.7.
    pub medium: usize,
    /// Probability at most 0.4.
    pub low: usize,
}

impl TierCounts {
    /// Buckets every prediction by [`RiskTier`].
    #[must_use]
    pub fn from_predictions(predictions: &[PredictionRow]) -> Self {
        let mut counts = Self::default();
        for p in predictions {
            match RiskTier::from_probability(p.probability) {
                RiskTier::High => counts.high += 1,
                RiskTier::Medium => counts.medium += 1,
                RiskTier::Low => counts.low += 1,
            }
        }
        counts
    }
}

/// Checks a requested horizon and narrows it.
///
/// # Errors
///
/// Returns [`PredictionError::InvalidHorizon`] outside
/// `1..=MAX_HORIZON_DAYS`.
pub fn validate_horizon(horizon: i64) -> Result<u32, PredictionError> {
    u32::try_from(horizon)
        .ok()
        .filter(|h| (1..=MAX_HORIZON_DAYS).contains(h))
        .ok_or(PredictionError::InvalidHorizon { horizon })
}

/// Runs a model and keeps its output in the store.
pub struct PredictionService {
    model: Arc<dyn PredictionModel>,
    regions: Arc<RegionTable>,
}

impl PredictionService {
    /// Creates a service around `model`.
    #[must_use]
    pub fn new(model: Arc<dyn PredictionModel>, regions: Arc<RegionTable>) -> Self {
        Self { model, regions }
    }

    /// Creates a service around the shipped [`DensityModel`].
    #[must_use]
    pub fn density(regions: Arc<RegionTable>) -> Self {
        Self::new(Arc::new(DensityModel), regions)
    }

    /// Version of the wrapped model.
    #[must_use]
    pub fn model_version(&self) -> &'static str {
        self.model.version()
    }

    /// Generates predictions and replaces whatever was stored for the same
    /// region, date and horizon. Returned highest probability first.
    ///
    /// # Errors
    ///
    /// * [`PredictionError::Geo`] if the region is unknown
    /// * [`PredictionError::InvalidHorizon`] if the horizon is out of range
    /// * [`PredictionError::Database`] if reading history or storing fails
    pub async fn generate(
        &self,
        db: &dyn Database,
        region_id: &str,
        date: NaiveDate,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictionRow>, PredictionError> {
        let region = self.regions.require(region_id)?;
        let horizon = validate_horizon(i64::from(horizon_days))?;

        let start = date
            .checked_sub_days(Days::new(u64::from(self.model.lookback_days())))
            .unwrap_or(NaiveDate::MIN);
        let history = detections::query(
            db,
            &DetectionQuery {
                date_range: Some(DateRange { start, end: date }),
                bounds: Some(region.bounds),
                ..DetectionQuery::default()
            },
        )
        .await?;

        let prediction_date = date.format("%Y-%m-%d").to_string();
        let stored_horizon = i32::try_from(horizon).unwrap_or(i32::MAX);
        let version = self.model.version();

        let mut rows = self
            .model
            .predict(region, date, horizon, &history)
            .into_iter()
            .map(|cell| {
                Ok(PredictionRow {
                    id: uuid::Uuid::new_v4().to_string(),
                    region: region.id.clone(),
                    grid_lat: cell.grid_lat,
                    grid_lng: cell.grid_lng,
                    probability: cell.probability,
                    confidence: cell.confidence,
                    prediction_date: prediction_date.clone(),
                    prediction_horizon: stored_horizon,
                    model_version: version.to_string(),
                    features: serde_json::to_string(&cell.features)?,
                    created_at: now,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        let stored =
            predictions::replace(db, &region.id, &prediction_date, stored_horizon, &rows).await?;

        log::info!(
            "Generated {stored} prediction(s) for {} on {prediction_date} (+{horizon}d) from {} detection(s) with {version}",
            region.id,
            history.len(),
        );

        Ok(rows)
    }

    /// Returns stored predictions, generating them first if none exist.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub async fn get_or_generate(
        &self,
        db: &dyn Database,
        region_id: &str,
        date: NaiveDate,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictionRow>, PredictionError> {
        let region = self.regions.require(region_id)?;
        let horizon = validate_horizon(i64::from(horizon_days))?;
        let prediction_date = date.format("%Y-%m-%d").to_string();

        let stored = predictions::query(
            db,
            &region.id,
            &prediction_date,
            i32::try_from(horizon).unwrap_or(i32::MAX),
        )
        .await?;

        if !stored.is_empty() {
            return Ok(stored);
        }

        log::debug!("No stored predictions for {} on {prediction_date}; generating", region.id);
        self.generate(db, region_id, date, horizon, now).await
    }
}
